use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    Baseline,
    Candidate,
}

impl ModelRole {
    pub const ALL: [Self; 2] = [Self::Baseline, Self::Candidate];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Candidate => "candidate",
        }
    }
}

impl std::fmt::Display for ModelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Role used for the instruction message. Migrated deployments expect
/// `developer`; legacy ones still take `system`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Developer,
}

impl MessageRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Developer => "developer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    None,
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenLimitField {
    MaxTokens,
    MaxCompletionTokens,
}

impl TokenLimitField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MaxTokens => "max_tokens",
            Self::MaxCompletionTokens => "max_completion_tokens",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub max_output_tokens: u32,
    pub token_limit_field: TokenLimitField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    pub instruction_role: MessageRole,
    pub system_prompt: String,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_output_tokens: 500,
            token_limit_field: TokenLimitField::MaxCompletionTokens,
            temperature: None,
            top_p: None,
            reasoning_effort: None,
            instruction_role: MessageRole::Developer,
            system_prompt: "You are a helpful assistant.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfiguration {
    pub label: String,
    pub deployment: String,
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(flatten)]
    pub params: GenerationParams,
}

impl ModelConfiguration {
    /// Pre-migration chat configuration.
    #[must_use]
    pub fn legacy_chat() -> Self {
        Self {
            label: "gpt-4o".to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-10-21".to_string(),
            endpoint: None,
            params: GenerationParams {
                max_output_tokens: 500,
                token_limit_field: TokenLimitField::MaxTokens,
                temperature: Some(0.7),
                top_p: None,
                reasoning_effort: None,
                instruction_role: MessageRole::System,
                ..GenerationParams::default()
            },
        }
    }

    /// Post-migration reasoning configuration.
    #[must_use]
    pub fn migrated_reasoning() -> Self {
        Self {
            label: "gpt-5.1".to_string(),
            deployment: "gpt-5.1".to_string(),
            api_version: "2025-06-01".to_string(),
            endpoint: None,
            params: GenerationParams {
                reasoning_effort: Some(ReasoningEffort::Low),
                ..GenerationParams::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub test_id: String,
    pub model_label: String,
    pub response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl ScoreRange {
    pub const LIKERT: Self = Self { min: 1.0, max: 5.0 };

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}
