use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{EvalError, Result};

/// Attached to every generated case whose ground truth is a historical model
/// response that nobody has signed off on yet.
pub const UNREVIEWED_GROUND_TRUTH_TAG: &str = "ground_truth:unreviewed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub test_id: String,
    pub query: String,
    #[serde(
        default,
        deserialize_with = "deserialize_context",
        skip_serializing_if = "Map::is_empty"
    )]
    pub context: Map<String, Value>,
    #[serde(alias = "expected_output")]
    pub ground_truth: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

impl TestCase {
    pub fn validate(&self) -> Result<()> {
        if self.test_id.trim().is_empty() {
            return Err(EvalError::Validation("test_id cannot be empty".to_string()));
        }
        if self.query.trim().is_empty() {
            return Err(EvalError::Validation(format!(
                "test case {} has an empty query",
                self.test_id
            )));
        }
        if self.ground_truth.trim().is_empty() {
            return Err(EvalError::Validation(format!(
                "test case {} has an empty ground_truth",
                self.test_id
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn ground_truth_reviewed(&self) -> bool {
        !self.tags.contains(UNREVIEWED_GROUND_TRUTH_TAG)
    }

    /// Flattens `context` into the single text block handed to models and
    /// judges.
    #[must_use]
    pub fn context_text(&self) -> Option<String> {
        if self.context.is_empty() {
            return None;
        }
        if self.context.len() == 1
            && let Some(Value::String(text)) = self.context.get("text")
        {
            return Some(text.clone());
        }
        let rendered = self
            .context
            .iter()
            .map(|(key, value)| match value {
                Value::String(text) => format!("{key}: {text}"),
                other => format!("{key}: {other}"),
            })
            .collect::<Vec<_>>()
            .join("\n");
        Some(rendered)
    }
}

fn deserialize_context<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        Value::String(text) if text.trim().is_empty() => Ok(Map::new()),
        Value::String(text) => {
            let mut map = Map::new();
            map.insert("text".to_string(), Value::String(text));
            Ok(map)
        }
        other => Err(serde::de::Error::custom(format!(
            "context must be an object or string, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub path: String,
    pub cases: usize,
    pub fingerprint: String,
    pub unreviewed_ground_truth: usize,
    pub categories: BTreeMap<String, usize>,
    pub languages: BTreeMap<String, usize>,
}
