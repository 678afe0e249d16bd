use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{ExtractionCounts, RawInteraction, SourceKind};

mod document_store;
mod flat_export;
mod log_analytics;
mod mapping;

pub use mapping::{FieldMap, map_document};
pub(crate) use mapping::parse_timestamp;

pub const DEFAULT_DOCUMENT_COLUMN: &str = "payload";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    /// SQLite database with one JSON document per row.
    DocumentStore {
        path: PathBuf,
        table: String,
        column: String,
    },
    /// Log-analytics query export, one JSON object per line.
    LogAnalytics { path: PathBuf },
    /// CSV export with a header row.
    FlatExport { path: PathBuf },
}

impl LogSource {
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        match self {
            Self::DocumentStore { .. } => SourceKind::DocumentStore,
            Self::LogAnalytics { .. } => SourceKind::LogAnalytics,
            Self::FlatExport { .. } => SourceKind::FlatExport,
        }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::DocumentStore { path, .. }
            | Self::LogAnalytics { path }
            | Self::FlatExport { path } => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractFilters {
    pub categories: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    pub model: Option<String>,
}

impl ExtractFilters {
    /// Records without a timestamp never pass a `since` filter.
    #[must_use]
    pub fn accepts(&self, record: &RawInteraction) -> bool {
        if !self.categories.is_empty()
            && !self
                .categories
                .iter()
                .any(|category| category.trim().eq_ignore_ascii_case(record.category.trim()))
        {
            return false;
        }
        if let Some(since) = self.since {
            match record.timestamp {
                Some(timestamp) if timestamp >= since => {}
                _ => return false,
            }
        }
        if let Some(model) = self.model.as_deref() {
            match record.model.as_deref() {
                Some(label) if label.trim().eq_ignore_ascii_case(model.trim()) => {}
                _ => return false,
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub records: Vec<RawInteraction>,
    pub scanned: usize,
    pub skipped: usize,
    pub filtered_out: usize,
    pub first_error: Option<String>,
}

impl ExtractionOutcome {
    #[must_use]
    pub fn counts(&self) -> ExtractionCounts {
        ExtractionCounts {
            scanned: self.scanned,
            normalized: self.records.len(),
            skipped: self.skipped,
            filtered_out: self.filtered_out,
            first_error: self.first_error.clone(),
        }
    }

    #[must_use]
    pub fn categories(&self) -> BTreeSet<&str> {
        self.records
            .iter()
            .map(|record| record.category.as_str())
            .collect()
    }

    fn record_skip(&mut self, reason: String) {
        self.skipped += 1;
        if self.first_error.is_none() {
            self.first_error = Some(reason);
        }
    }
}

/// One unit read from a source: a decoded document, or the reason it could
/// not be decoded (with its position for diagnostics).
pub(crate) type SourceItem = std::result::Result<Value, String>;

pub fn extract(
    source: &LogSource,
    fields: &FieldMap,
    filters: &ExtractFilters,
) -> Result<ExtractionOutcome> {
    let items = match source {
        LogSource::DocumentStore {
            path,
            table,
            column,
        } => document_store::read_documents(path, table, column)?,
        LogSource::LogAnalytics { path } => log_analytics::read_documents(path)?,
        LogSource::FlatExport { path } => flat_export::read_documents(path)?,
    };
    let outcome = normalize(items, fields, filters, source.kind());
    info!(
        source = %source.kind(),
        path = %source.path().display(),
        scanned = outcome.scanned,
        normalized = outcome.records.len(),
        skipped = outcome.skipped,
        filtered_out = outcome.filtered_out,
        "extraction finished"
    );
    if let Some(reason) = outcome.first_error.as_deref() {
        warn!(skipped = outcome.skipped, first_error = reason, "skipped malformed records");
    }
    Ok(outcome)
}

pub(crate) fn normalize(
    items: Vec<SourceItem>,
    fields: &FieldMap,
    filters: &ExtractFilters,
    kind: SourceKind,
) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::default();
    for item in items {
        outcome.scanned += 1;
        let record = item.and_then(|document| map_document(&document, fields, kind));
        match record {
            Ok(record) if filters.accepts(&record) => outcome.records.push(record),
            Ok(_) => outcome.filtered_out += 1,
            Err(reason) => outcome.record_skip(reason),
        }
    }
    outcome
}
