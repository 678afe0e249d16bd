use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("log source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("model transport failed: {0}")]
    Transport(String),

    #[error("evaluator failed: {0}")]
    Evaluator(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub operation: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl EvalError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Evaluator(_) => "EVALUATOR_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Csv(_) => "CSV_ERROR",
            Self::Toml(_) => "TOML_ERROR",
            Self::Http(_) => "HTTP_ERROR",
            Self::Regex(_) => "REGEX_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_payload(&self, operation: impl Into<String>, path: Option<String>) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            operation: operation.into(),
            trace_id: Uuid::new_v4().to_string(),
            path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_code_operation_and_trace_id() {
        let err = EvalError::Validation("sample size must be positive".to_string());
        let payload = err.to_payload("dataset.build", Some("pool.jsonl".to_string()));
        assert_eq!(payload.code, "VALIDATION_FAILED");
        assert_eq!(payload.operation, "dataset.build");
        assert!(payload.message.contains("sample size"));
        assert_eq!(payload.path.as_deref(), Some("pool.jsonl"));
        assert!(Uuid::parse_str(&payload.trace_id).is_ok());
    }

    #[test]
    fn io_errors_map_to_io_code() {
        let err = EvalError::from(std::io::Error::other("disk gone"));
        assert_eq!(err.code(), "IO_ERROR");
    }
}
