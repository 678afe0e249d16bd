use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{EvalError, Result};
use crate::gate::QualityGatePolicy;
use crate::models::{GenerationParams, ModelConfiguration};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub endpoint: Option<String>,
    pub judge_model: Option<String>,
    pub models: BTreeMap<String, ModelEntry>,
    pub gate: QualityGatePolicy,
    pub run: RunSection,
}

/// One `[models.<id>]` table. `label` and `deployment` fall back to the id.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub deployment: Option<String>,
    pub api_version: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(flatten)]
    pub params: GenerationParams,
}

impl ModelEntry {
    #[must_use]
    pub fn into_configuration(self, id: &str) -> ModelConfiguration {
        ModelConfiguration {
            label: self.label.unwrap_or_else(|| id.to_string()),
            deployment: self.deployment.unwrap_or_else(|| id.to_string()),
            api_version: self.api_version,
            endpoint: self.endpoint,
            params: self.params,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
    pub concurrency: Option<usize>,
    pub max_attempts: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub call_timeout_ms: Option<u64>,
    pub run_timeout_secs: Option<u64>,
    pub abort_failure_rate: Option<f64>,
    pub include_cases: Option<bool>,
    pub require_reviewed_ground_truth: Option<bool>,
}

pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = fs::read_to_string(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            EvalError::NotFound(format!("config file {}", path.display()))
        } else {
            EvalError::Io(err)
        }
    })?;
    parse_config_file(&raw)
}

pub fn parse_config_file(raw: &str) -> Result<ConfigFile> {
    Ok(toml::from_str::<ConfigFile>(raw)?)
}
