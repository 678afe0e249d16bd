use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

use crate::models::{ModelConfiguration, TokenLimitField};

pub fn extract_llm_content(value: &Value) -> Option<String> {
    if let Some(content) = value
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
    {
        return Some(content.to_string());
    }
    if let Some(content) = value
        .get("choices")
        .and_then(|choices| choices.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
    {
        return Some(content.to_string());
    }
    if let Some(content) = value.get("response").and_then(|response| response.as_str()) {
        return Some(content.to_string());
    }
    None
}

pub fn extract_json_fragment(text: &str) -> Option<String> {
    let start = text
        .char_indices()
        .find(|(_, c)| *c == '{' || *c == '[')
        .map(|(idx, _)| idx)?;
    let sliced = &text[start..];
    let end = sliced
        .char_indices()
        .rev()
        .find(|(_, c)| *c == '}' || *c == ']')
        .map(|(idx, c)| idx + c.len_utf8())?;
    Some(sliced[..end].to_string())
}

/// Renders a chat-completions body in the parameter dialect the configuration
/// declares: legacy (`max_tokens`, sampling knobs) or migrated
/// (`max_completion_tokens`, `reasoning_effort`).
pub fn build_chat_payload(configuration: &ModelConfiguration, instruction: &str, user: &str) -> Value {
    let params = &configuration.params;
    let mut payload = json!({
        "model": configuration.deployment,
        "messages": [
            {"role": params.instruction_role.as_str(), "content": instruction},
            {"role": "user", "content": user},
        ],
    });
    let Some(body) = payload.as_object_mut() else {
        return payload;
    };
    body.insert(
        params.token_limit_field.as_str().to_string(),
        json!(params.max_output_tokens),
    );
    if params.token_limit_field == TokenLimitField::MaxTokens {
        if let Some(temperature) = params.temperature {
            body.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(top_p) = params.top_p {
            body.insert("top_p".to_string(), json!(top_p));
        }
    }
    if let Some(effort) = params.reasoning_effort {
        body.insert("reasoning_effort".to_string(), json!(effort.as_str()));
    }
    payload
}

static SCORE_IN_TEXT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)score\D{0,12}?(\d+(?:\.\d+)?)").ok());

fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Reads a judge verdict: a JSON object with `score` (and optionally
/// `reason`) anywhere in the text, or a bare "score: N" phrase.
pub fn parse_judgement(text: &str) -> Option<(f64, Option<String>)> {
    if let Some(fragment) = extract_json_fragment(text)
        && let Ok(value) = serde_json::from_str::<Value>(&fragment)
        && let Some(score) = value.get("score").and_then(number_value)
    {
        let reason = value
            .get("reason")
            .or_else(|| value.get("rationale"))
            .and_then(Value::as_str)
            .map(ToString::to_string);
        return Some((score, reason));
    }
    if let Ok(score) = text.trim().parse::<f64>() {
        return Some((score, None));
    }
    let pattern = SCORE_IN_TEXT.as_ref()?;
    let captures = pattern.captures(text)?;
    let score = captures.get(1)?.as_str().parse::<f64>().ok()?;
    Some((score, None))
}
