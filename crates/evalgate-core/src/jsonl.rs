use serde::de::DeserializeOwned;

use crate::error::EvalError;

#[derive(Debug, Clone)]
pub struct JsonlParseOutcome<T> {
    pub items: Vec<T>,
    pub skipped_lines: usize,
    pub first_error: Option<(usize, String)>,
}

pub fn parse_jsonl_tolerant<T>(raw: &str) -> JsonlParseOutcome<T>
where
    T: DeserializeOwned,
{
    let mut items = Vec::new();
    let mut skipped_lines = 0usize;
    let mut first_error = None::<(usize, String)>;

    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(value) => items.push(value),
            Err(err) => {
                skipped_lines += 1;
                if first_error.is_none() {
                    first_error = Some((line_no + 1, err.to_string()));
                }
            }
        }
    }

    JsonlParseOutcome {
        items,
        skipped_lines,
        first_error,
    }
}

/// Strict variant: the first undecodable line fails the whole parse.
pub fn parse_jsonl_strict<T>(raw: &str, label: &str) -> Result<Vec<T>, EvalError>
where
    T: DeserializeOwned,
{
    let mut items = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str::<T>(line).map_err(|err| {
            EvalError::Validation(format!(
                "{label} parse failed at line {}: {err}",
                line_no + 1
            ))
        })?;
        items.push(value);
    }
    Ok(items)
}
