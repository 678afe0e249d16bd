use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{EvalError, Result};
use crate::gate::QualityGatePolicy;
use crate::models::ModelConfiguration;
use crate::runner::RunPolicy;

mod env;
mod file;

pub use file::{ConfigFile, ModelEntry, RunSection, load_config_file, parse_config_file};

pub const ENDPOINT_ENV: &str = "EVALGATE_ENDPOINT";
pub const API_KEY_ENV: &str = "EVALGATE_API_KEY";
pub const CONCURRENCY_ENV: &str = "EVALGATE_CONCURRENCY";
pub const CALL_TIMEOUT_MS_ENV: &str = "EVALGATE_CALL_TIMEOUT_MS";
pub const RUN_TIMEOUT_SECS_ENV: &str = "EVALGATE_RUN_TIMEOUT_SECS";
pub const MAX_ATTEMPTS_ENV: &str = "EVALGATE_MAX_ATTEMPTS";
pub const ABORT_FAILURE_RATE_ENV: &str = "EVALGATE_ABORT_FAILURE_RATE";
pub const JUDGE_MODEL_ENV: &str = "EVALGATE_JUDGE_MODEL";

pub const DEFAULT_JUDGE_MODEL: &str = "gpt-4o";

/// Values read from the process environment. Unset or unparsable variables
/// stay `None` so lower layers keep their value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub judge_model: Option<String>,
    pub concurrency: Option<usize>,
    pub call_timeout_ms: Option<u64>,
    pub run_timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub abort_failure_rate: Option<f64>,
}

impl EnvOverrides {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            endpoint: env::read_non_empty_env(ENDPOINT_ENV),
            api_key: env::read_non_empty_env(API_KEY_ENV),
            judge_model: env::read_non_empty_env(JUDGE_MODEL_ENV),
            concurrency: env::read_env_usize(CONCURRENCY_ENV, 1),
            call_timeout_ms: env::read_env_u64(CALL_TIMEOUT_MS_ENV).filter(|value| *value > 0),
            run_timeout_secs: env::read_env_u64(RUN_TIMEOUT_SECS_ENV).filter(|value| *value > 0),
            max_attempts: env::read_env_u32(MAX_ATTEMPTS_ENV, 1),
            abort_failure_rate: env::read_env_fraction(ABORT_FAILURE_RATE_ENV),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub judge_model: String,
    pub models: BTreeMap<String, ModelConfiguration>,
    pub gate: QualityGatePolicy,
    pub run: RunPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            judge_model: DEFAULT_JUDGE_MODEL.to_string(),
            models: builtin_models(),
            gate: QualityGatePolicy::default(),
            run: RunPolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Built-in defaults, then the optional TOML file, then the environment.
    /// Command-line flags are applied by the caller on top.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let file = match config_path {
            Some(path) => Some(load_config_file(path)?),
            None => None,
        };
        Self::resolve(file, EnvOverrides::from_env())
    }

    pub fn resolve(file: Option<ConfigFile>, env: EnvOverrides) -> Result<Self> {
        let mut config = Self::default();
        if let Some(file) = file {
            config.apply_file(file);
        }
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if file.endpoint.is_some() {
            self.endpoint = file.endpoint;
        }
        if let Some(judge_model) = file.judge_model {
            self.judge_model = judge_model;
        }
        for (id, entry) in file.models {
            let configuration = entry.into_configuration(&id);
            self.models.insert(id, configuration);
        }
        self.gate = file.gate;

        let run = file.run;
        if let Some(value) = run.concurrency {
            self.run.concurrency = value;
        }
        if let Some(value) = run.max_attempts {
            self.run.max_attempts = value;
        }
        if let Some(value) = run.backoff_base_ms {
            self.run.backoff_base = Duration::from_millis(value);
        }
        if let Some(value) = run.call_timeout_ms {
            self.run.call_timeout = Duration::from_millis(value);
        }
        if let Some(value) = run.run_timeout_secs {
            self.run.run_timeout = Some(Duration::from_secs(value));
        }
        if let Some(value) = run.abort_failure_rate {
            self.run.abort_failure_rate = value;
        }
        if let Some(value) = run.include_cases {
            self.run.include_cases = value;
        }
        if let Some(value) = run.require_reviewed_ground_truth {
            self.run.require_reviewed_ground_truth = value;
        }
    }

    fn apply_env(&mut self, env: EnvOverrides) {
        if env.endpoint.is_some() {
            self.endpoint = env.endpoint;
        }
        if env.api_key.is_some() {
            self.api_key = env.api_key;
        }
        if let Some(judge_model) = env.judge_model {
            self.judge_model = judge_model;
        }
        if let Some(value) = env.concurrency {
            self.run.concurrency = value;
        }
        if let Some(value) = env.call_timeout_ms {
            self.run.call_timeout = Duration::from_millis(value);
        }
        if let Some(value) = env.run_timeout_secs {
            self.run.run_timeout = Some(Duration::from_secs(value));
        }
        if let Some(value) = env.max_attempts {
            self.run.max_attempts = value;
        }
        if let Some(value) = env.abort_failure_rate {
            self.run.abort_failure_rate = value;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.gate.validate()?;
        self.run.validate()
    }

    pub fn model(&self, id: &str) -> Result<ModelConfiguration> {
        self.models.get(id).cloned().ok_or_else(|| {
            let known = self.models.keys().cloned().collect::<Vec<_>>().join(", ");
            EvalError::Config(format!("unknown model configuration '{id}' (known: {known})"))
        })
    }
}

#[must_use]
pub fn builtin_models() -> BTreeMap<String, ModelConfiguration> {
    [
        ModelConfiguration::legacy_chat(),
        ModelConfiguration::migrated_reasoning(),
    ]
    .into_iter()
    .map(|configuration| (configuration.label.clone(), configuration))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenLimitField;

    #[test]
    fn builtin_catalog_has_legacy_and_migrated_models() {
        let config = AppConfig::default();
        let legacy = config.model("gpt-4o").expect("legacy");
        assert_eq!(legacy.params.token_limit_field, TokenLimitField::MaxTokens);
        assert_eq!(legacy.params.temperature, Some(0.7));
        let migrated = config.model("gpt-5.1").expect("migrated");
        assert_eq!(migrated.api_version, "2025-06-01");
        assert!(migrated.params.temperature.is_none());
    }

    #[test]
    fn unknown_model_lists_known_ids() {
        let err = AppConfig::default().model("gpt-3").expect_err("unknown");
        let message = err.to_string();
        assert!(message.contains("gpt-3"));
        assert!(message.contains("gpt-4o, gpt-5.1"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let file = parse_config_file(
            r#"
endpoint = "https://file.example"

[run]
concurrency = 2
abort_failure_rate = 0.3
"#,
        )
        .expect("parse");
        let env = EnvOverrides {
            endpoint: Some("https://env.example".to_string()),
            concurrency: Some(6),
            ..EnvOverrides::default()
        };
        let config = AppConfig::resolve(Some(file), env).expect("resolve");
        assert_eq!(config.endpoint.as_deref(), Some("https://env.example"));
        assert_eq!(config.run.concurrency, 6);
        assert!((config.run.abort_failure_rate - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_file_policy_fails_resolution() {
        let file = parse_config_file("[run]\nconcurrency = 0\n").expect("parse");
        let err = AppConfig::resolve(Some(file), EnvOverrides::default()).expect_err("invalid");
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
