use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{EvalError, Result};
use crate::models::{RawInteraction, SourceKind, UNKNOWN_CATEGORY};
use crate::text::non_blank;

/// Source field names for each common attribute. Names may be dotted paths
/// (`customDimensions.query`) to reach into nested documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    pub id: String,
    pub timestamp: String,
    pub query: String,
    pub context: String,
    pub category: String,
    pub language: String,
    pub model: String,
    pub response: String,
}

impl FieldMap {
    #[must_use]
    pub fn defaults_for(kind: SourceKind) -> Self {
        match kind {
            SourceKind::DocumentStore | SourceKind::FlatExport => Self {
                id: "id".to_string(),
                timestamp: "timestamp".to_string(),
                query: "query".to_string(),
                context: "context".to_string(),
                category: "category".to_string(),
                language: "language".to_string(),
                model: "model".to_string(),
                response: "response".to_string(),
            },
            SourceKind::LogAnalytics => Self {
                id: "operation_Id".to_string(),
                timestamp: "timestamp".to_string(),
                query: "customDimensions.query".to_string(),
                context: "customDimensions.context".to_string(),
                category: "customDimensions.category".to_string(),
                language: "customDimensions.language".to_string(),
                model: "customDimensions.model".to_string(),
                response: "customDimensions.response".to_string(),
            },
        }
    }

    /// Replaces one attribute's source name, e.g. `query=prompt`.
    pub fn set(&mut self, attribute: &str, source_field: &str) -> Result<()> {
        let source_field = source_field.trim();
        if source_field.is_empty() {
            return Err(EvalError::Validation(format!(
                "field map entry for {attribute} is empty"
            )));
        }
        let slot = match attribute.trim() {
            "id" => &mut self.id,
            "timestamp" => &mut self.timestamp,
            "query" => &mut self.query,
            "context" => &mut self.context,
            "category" => &mut self.category,
            "language" => &mut self.language,
            "model" => &mut self.model,
            "response" => &mut self.response,
            other => {
                return Err(EvalError::Validation(format!(
                    "unknown field map attribute: {other}"
                )));
            }
        };
        *slot = source_field.to_string();
        Ok(())
    }

    pub fn apply_overrides<'a>(
        &mut self,
        overrides: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        for entry in overrides {
            let (attribute, source_field) = entry.split_once('=').ok_or_else(|| {
                EvalError::Validation(format!(
                    "field map override must look like attribute=field, got: {entry}"
                ))
            })?;
            self.set(attribute, source_field)?;
        }
        Ok(())
    }
}

fn lookup<'a>(document: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(value) = document.get(path) {
        return Some(value);
    }
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn optional_string(
    document: &Map<String, Value>,
    path: &str,
) -> std::result::Result<Option<String>, String> {
    match lookup(document, path) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(non_blank(Some(text))),
        Some(other) => Err(format!("field {path} must be a string, got {other}")),
    }
}

fn text_field(document: &Map<String, Value>, path: &str) -> std::result::Result<String, String> {
    match lookup(document, path) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(format!("field {path} must be a string, got {other}")),
    }
}

fn identifier(
    document: &Map<String, Value>,
    path: &str,
) -> std::result::Result<Option<String>, String> {
    match lookup(document, path) {
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        _ => optional_string(document, path),
    }
}

fn context(
    document: &Map<String, Value>,
    path: &str,
) -> std::result::Result<Map<String, Value>, String> {
    match lookup(document, path) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(Map::new());
            }
            if trimmed.starts_with('{')
                && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed)
            {
                return Ok(map);
            }
            let mut map = Map::new();
            map.insert("text".to_string(), Value::String(text.clone()));
            Ok(map)
        }
        Some(other) => Err(format!("field {path} must be an object or string, got {other}")),
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn timestamp(
    document: &Map<String, Value>,
    path: &str,
) -> std::result::Result<Option<DateTime<Utc>>, String> {
    let Some(raw) = optional_string(document, path)? else {
        return Ok(None);
    };
    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| format!("field {path} is not a valid timestamp: {raw}"))
}

/// Maps one source document into the common record shape. The error string
/// describes why the record is malformed; callers skip and count it.
pub fn map_document(
    document: &Value,
    fields: &FieldMap,
    source: SourceKind,
) -> std::result::Result<RawInteraction, String> {
    let Value::Object(document) = document else {
        return Err("record is not a JSON object".to_string());
    };

    Ok(RawInteraction {
        id: identifier(document, &fields.id)?,
        timestamp: timestamp(document, &fields.timestamp)?,
        query: text_field(document, &fields.query)?,
        context: context(document, &fields.context)?,
        category: optional_string(document, &fields.category)?
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
        language: optional_string(document, &fields.language)?,
        model: optional_string(document, &fields.model)?,
        response: text_field(document, &fields.response)?,
        source,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_optional_fields_get_defaults() {
        let fields = FieldMap::defaults_for(SourceKind::DocumentStore);
        let record = map_document(
            &json!({"query": "When is my bill due?", "response": "On the 1st."}),
            &fields,
            SourceKind::DocumentStore,
        )
        .expect("map");
        assert_eq!(record.category, UNKNOWN_CATEGORY);
        assert!(record.context.is_empty());
        assert!(record.language.is_none());
        assert!(record.id.is_none());
    }

    #[test]
    fn dotted_paths_reach_nested_dimensions() {
        let fields = FieldMap::defaults_for(SourceKind::LogAnalytics);
        let record = map_document(
            &json!({
                "operation_Id": "op-1",
                "timestamp": "2025-03-01T10:00:00Z",
                "customDimensions": {
                    "query": "Cancel my plan",
                    "response": "Sure.",
                    "category": "Cancellation",
                    "language": "en",
                    "context": "{\"account_tier\": \"gold\"}"
                }
            }),
            &fields,
            SourceKind::LogAnalytics,
        )
        .expect("map");
        assert_eq!(record.id.as_deref(), Some("op-1"));
        assert_eq!(record.category, "Cancellation");
        assert_eq!(record.context.get("account_tier"), Some(&json!("gold")));
        assert!(record.timestamp.is_some());
    }

    #[test]
    fn wrongly_typed_field_is_malformed() {
        let fields = FieldMap::defaults_for(SourceKind::DocumentStore);
        let err = map_document(
            &json!({"query": 42, "response": "x"}),
            &fields,
            SourceKind::DocumentStore,
        )
        .expect_err("malformed");
        assert!(err.contains("query"));
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let fields = FieldMap::defaults_for(SourceKind::FlatExport);
        let err = map_document(
            &json!({"query": "q", "response": "r", "timestamp": "yesterday"}),
            &fields,
            SourceKind::FlatExport,
        )
        .expect_err("malformed");
        assert!(err.contains("timestamp"));
    }

    #[test]
    fn plain_string_context_is_wrapped() {
        let fields = FieldMap::defaults_for(SourceKind::FlatExport);
        let record = map_document(
            &json!({"query": "q", "response": "r", "context": "prior ticket #12"}),
            &fields,
            SourceKind::FlatExport,
        )
        .expect("map");
        assert_eq!(record.context.get("text"), Some(&json!("prior ticket #12")));
    }

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        let parsed = parse_timestamp("2025-01-02 03:04:05").expect("parse");
        assert_eq!(parsed.to_rfc3339(), "2025-01-02T03:04:05+00:00");
    }

    #[test]
    fn overrides_replace_source_names() {
        let mut fields = FieldMap::defaults_for(SourceKind::FlatExport);
        fields
            .apply_overrides(["query=prompt", "response = answer"])
            .expect("override");
        assert_eq!(fields.query, "prompt");
        assert_eq!(fields.response, "answer");
        assert!(fields.apply_overrides(["nope"]).is_err());
        assert!(fields.apply_overrides(["colour=x"]).is_err());
    }
}
