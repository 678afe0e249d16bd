use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Info,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Info => "INFO",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFinding {
    pub file_path: String,
    pub line_number: usize,
    pub line_content: String,
    pub issue_type: String,
    pub severity: Severity,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub info: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub root: String,
    pub files_scanned: usize,
    pub files_unreadable: usize,
    pub counts: AuditSeverityCounts,
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    #[must_use]
    pub const fn has_blocking_findings(&self) -> bool {
        self.counts.high > 0
    }
}
