use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::SourceKind;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionCounts {
    pub scanned: usize,
    pub normalized: usize,
    pub skipped: usize,
    pub filtered_out: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingCounts {
    pub requested: usize,
    pub selected: usize,
    pub shortfall: usize,
    pub per_category: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattingCounts {
    pub emitted: usize,
    pub skipped_missing_query: usize,
    pub skipped_missing_ground_truth: usize,
    pub skipped_duplicate_id: usize,
}

impl FormattingCounts {
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped_missing_query + self.skipped_missing_ground_truth + self.skipped_duplicate_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetBuildReport {
    pub created_at: String,
    pub source: SourceKind,
    pub source_path: String,
    pub output_path: String,
    pub fingerprint: String,
    pub extraction: ExtractionCounts,
    pub sampling: SamplingCounts,
    pub formatting: FormattingCounts,
}
