use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::{EvalError, Result};
use crate::llm_io::{build_chat_payload, extract_llm_content};
use crate::models::{ModelConfiguration, TestCase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeErrorKind {
    /// Worth retrying: throttling, server errors, dropped connections.
    Transient,
    /// Retrying cannot help: bad request, auth, unusable response.
    Fatal,
    Timeout,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct InvokeError {
    pub kind: InvokeErrorKind,
    pub message: String,
}

impl InvokeError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: InvokeErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: InvokeErrorKind::Fatal,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: InvokeErrorKind::Timeout,
            message: format!("call timed out after {} ms", after.as_millis()),
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind != InvokeErrorKind::Fatal
    }
}

/// Instruction and user turns for one chat call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub instruction: String,
    pub user: String,
}

impl ModelRequest {
    /// The configuration's system prompt, with the case context appended.
    #[must_use]
    pub fn for_case(case: &TestCase, configuration: &ModelConfiguration) -> Self {
        let mut instruction = configuration.params.system_prompt.clone();
        if let Some(context) = case.context_text() {
            instruction.push_str("\n\nContext: ");
            instruction.push_str(&context);
        }
        Self {
            instruction,
            user: case.query.clone(),
        }
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn invoke(
        &self,
        configuration: &ModelConfiguration,
        request: &ModelRequest,
    ) -> std::result::Result<String, InvokeError>;
}

/// Chat-completions adapter for deployment-scoped endpoints
/// (`{endpoint}/openai/deployments/{deployment}/chat/completions`).
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl ChatCompletionsClient {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(EvalError::Config("model endpoint is empty".to_string()));
        }
        reqwest::Url::parse(&endpoint)
            .map_err(|err| EvalError::Config(format!("invalid model endpoint: {err}")))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    #[must_use]
    pub fn completions_url(&self, configuration: &ModelConfiguration) -> String {
        let base = configuration
            .endpoint
            .as_deref()
            .map_or(self.endpoint.as_str(), |value| value.trim_end_matches('/'));
        format!(
            "{base}/openai/deployments/{}/chat/completions?api-version={}",
            configuration.deployment, configuration.api_version
        )
    }
}

fn classify_status(status: StatusCode, body: &str) -> InvokeError {
    let message = format!("model endpoint returned {status}: {}", body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        InvokeError::transient(message)
    } else {
        InvokeError::fatal(message)
    }
}

#[async_trait]
impl ModelClient for ChatCompletionsClient {
    async fn invoke(
        &self,
        configuration: &ModelConfiguration,
        request: &ModelRequest,
    ) -> std::result::Result<String, InvokeError> {
        let payload = build_chat_payload(configuration, &request.instruction, &request.user);
        let mut call = self.http.post(self.completions_url(configuration)).json(&payload);
        if let Some(api_key) = self.api_key.as_deref() {
            call = call.header("api-key", api_key);
        }
        let response = call.send().await.map_err(|err| {
            if err.is_timeout() {
                InvokeError {
                    kind: InvokeErrorKind::Timeout,
                    message: err.to_string(),
                }
            } else {
                InvokeError::transient(err.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| InvokeError::transient(format!("read body failed: {err}")))?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        let value = serde_json::from_str::<Value>(&body)
            .map_err(|err| InvokeError::fatal(format!("response is not JSON: {err}")))?;
        let content = extract_llm_content(&value)
            .ok_or_else(|| InvokeError::fatal("response carried no message content"))?;
        debug!(
            deployment = %configuration.deployment,
            chars = content.chars().count(),
            "model call succeeded"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::{Map, json};

    use super::*;

    #[test]
    fn request_appends_context_to_instruction() {
        let mut context = Map::new();
        context.insert("text".to_string(), json!("Customer is on the family plan."));
        let case = TestCase {
            test_id: "plans_0001".to_string(),
            query: "Can I add a line?".to_string(),
            context,
            ground_truth: "Yes.".to_string(),
            category: None,
            language: None,
            difficulty: None,
            tags: BTreeSet::new(),
        };
        let request = ModelRequest::for_case(&case, &ModelConfiguration::migrated_reasoning());
        assert_eq!(
            request.instruction,
            "You are a helpful assistant.\n\nContext: Customer is on the family plan."
        );
        assert_eq!(request.user, "Can I add a line?");
    }

    #[test]
    fn url_is_deployment_scoped_with_api_version() {
        let client = ChatCompletionsClient::new(
            "https://llm.example.com/",
            None,
            Duration::from_secs(5),
        )
        .expect("client");
        assert_eq!(
            client.completions_url(&ModelConfiguration::legacy_chat()),
            "https://llm.example.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-10-21"
        );
    }

    #[test]
    fn throttling_and_server_errors_are_retryable() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(!classify_status(StatusCode::BAD_REQUEST, "unsupported parameter").is_retryable());
        assert!(InvokeError::timeout(Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn empty_endpoint_is_config_error() {
        let err = ChatCompletionsClient::new("  ", None, Duration::from_secs(1)).expect_err("empty");
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
