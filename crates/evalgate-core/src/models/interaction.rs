use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const UNKNOWN_CATEGORY: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    DocumentStore,
    LogAnalytics,
    FlatExport,
}

impl SourceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DocumentStore => "document_store",
            Self::LogAnalytics => "log_analytics",
            Self::FlatExport => "flat_export",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// One captured production request/response pair, already mapped out of its
/// source-specific shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInteraction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub query: String,
    #[serde(default)]
    pub context: Map<String, Value>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub response: String,
    pub source: SourceKind,
}

impl RawInteraction {
    #[must_use]
    pub fn new(source: SourceKind, query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            id: None,
            timestamp: None,
            query: query.into(),
            context: Map::new(),
            category: UNKNOWN_CATEGORY.to_string(),
            language: None,
            model: None,
            response: response.into(),
            source,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}
