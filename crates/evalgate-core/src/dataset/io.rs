use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{EvalError, Result};
use crate::jsonl::parse_jsonl_strict;
use crate::models::{DatasetSummary, TestCase, UNKNOWN_CATEGORY};

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub cases: Vec<TestCase>,
    pub summary: DatasetSummary,
}

#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

pub fn render_dataset(cases: &[TestCase]) -> Result<String> {
    let mut out = String::new();
    for case in cases {
        out.push_str(&serde_json::to_string(case)?);
        out.push('\n');
    }
    Ok(out)
}

/// Writes cases as JSON Lines and returns the fingerprint of the bytes written.
pub fn write_dataset(path: &Path, cases: &[TestCase]) -> Result<String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let rendered = render_dataset(cases)?;
    fs::write(path, rendered.as_bytes())?;
    Ok(fingerprint(rendered.as_bytes()))
}

pub fn parse_dataset(raw: &str) -> Result<Vec<TestCase>> {
    let cases = parse_jsonl_strict::<TestCase>(raw, "dataset")?;
    let mut seen = HashSet::with_capacity(cases.len());
    for case in &cases {
        case.validate()?;
        if !seen.insert(case.test_id.as_str()) {
            return Err(EvalError::Validation(format!(
                "duplicate test_id in dataset: {}",
                case.test_id
            )));
        }
    }
    Ok(cases)
}

#[must_use]
pub fn summarize(path: &Path, cases: &[TestCase], bytes: &[u8]) -> DatasetSummary {
    let mut categories = BTreeMap::<String, usize>::new();
    let mut languages = BTreeMap::<String, usize>::new();
    for case in cases {
        let category = case.category.clone().unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
        *categories.entry(category).or_default() += 1;
        if let Some(language) = case.language.clone() {
            *languages.entry(language).or_default() += 1;
        }
    }
    DatasetSummary {
        path: path.display().to_string(),
        cases: cases.len(),
        fingerprint: fingerprint(bytes),
        unreviewed_ground_truth: cases
            .iter()
            .filter(|case| !case.ground_truth_reviewed())
            .count(),
        categories,
        languages,
    }
}

pub fn load_dataset(path: &Path) -> Result<LoadedDataset> {
    let raw = fs::read_to_string(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            EvalError::NotFound(format!("dataset {}", path.display()))
        } else {
            EvalError::Io(err)
        }
    })?;
    let cases = parse_dataset(&raw)?;
    if cases.is_empty() {
        return Err(EvalError::Validation(format!(
            "dataset {} contains no test cases",
            path.display()
        )));
    }
    let summary = summarize(path, &cases, raw.as_bytes());
    Ok(LoadedDataset { cases, summary })
}
