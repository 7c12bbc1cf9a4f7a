//! JSON Schema contracts for structured model output.

use std::fmt;
use std::sync::Arc;

use jsonschema::Validator;
use serde_json::Value;

use crate::error::{ModelError, Result};

/// A named JSON Schema that structured output must conform to.
///
/// The schema is compiled once at construction, so an invalid schema is a
/// construction-time error rather than a per-call one.
#[derive(Clone)]
pub struct OutputSchema {
    name: String,
    schema: Value,
    validator: Arc<Validator>,
}

impl OutputSchema {
    /// Compile a schema under the given name.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidSchema`] if `schema` is not a valid JSON Schema.
    pub fn new(name: impl Into<String>, schema: Value) -> Result<Self> {
        let name = name.into();
        let validator = Validator::new(&schema)
            .map_err(|e| ModelError::InvalidSchema(format!("{name}: {e}")))?;
        Ok(Self { name, schema, validator: Arc::new(validator) })
    }

    /// The schema's name, sent to backends that label structured output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw JSON Schema document.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validate a value against the schema.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::SchemaViolation`] describing the first mismatch.
    pub fn validate(&self, value: &Value) -> Result<()> {
        self.validator.validate(value).map_err(|e| ModelError::SchemaViolation {
            schema: self.name.clone(),
            message: e.to_string(),
        })
    }

    /// Parse raw model text as JSON and validate it.
    ///
    /// Accepts bare JSON or JSON wrapped in a markdown code fence.
    pub fn parse(&self, text: &str) -> Result<Value> {
        let value = extract_json(text).ok_or_else(|| ModelError::SchemaViolation {
            schema: self.name.clone(),
            message: "output is not valid JSON".to_string(),
        })?;
        self.validate(&value)?;
        Ok(value)
    }

    /// List the places where the schema breaks strict structured-output rules.
    ///
    /// Strict backends require every object to set `additionalProperties:
    /// false` and to list all of its properties in `required`; optional
    /// fields are expressed as nullable types instead. An empty list means
    /// the schema is accepted as is.
    pub fn strict_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        collect_strict_violations(&self.schema, &self.name, &mut violations);
        violations
    }
}

fn is_object_schema(node: &serde_json::Map<String, Value>) -> bool {
    match node.get("type") {
        Some(Value::String(t)) => t == "object",
        Some(Value::Array(types)) => types.iter().any(|t| t == "object"),
        _ => node.contains_key("properties"),
    }
}

fn collect_strict_violations(node: &Value, path: &str, violations: &mut Vec<String>) {
    let Some(node) = node.as_object() else {
        return;
    };

    if is_object_schema(node) {
        if node.get("additionalProperties") != Some(&Value::Bool(false)) {
            violations.push(format!("{path}: additionalProperties is not false"));
        }
        let required: Vec<&str> = node
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if let Some(properties) = node.get("properties").and_then(Value::as_object) {
            for (key, property) in properties {
                if !required.contains(&key.as_str()) {
                    violations.push(format!("{path}: property '{key}' is not required"));
                }
                collect_strict_violations(property, &format!("{path}/{key}"), violations);
            }
        }
    }

    if let Some(items) = node.get("items") {
        collect_strict_violations(items, &format!("{path}/items"), violations);
    }
    if let Some(variants) = node.get("anyOf").and_then(Value::as_array) {
        for (i, variant) in variants.iter().enumerate() {
            collect_strict_violations(variant, &format!("{path}/anyOf/{i}"), violations);
        }
    }
}

impl fmt::Debug for OutputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSchema").field("name", &self.name).field("schema", &self.schema).finish()
    }
}

fn extract_json(text: &str) -> Option<Value> {
    if let Ok(json) = serde_json::from_str(text.trim()) {
        return Some(json);
    }
    let start_markers = ["```json\n", "```json\r\n", "```\n", "```\r\n"];
    for start in start_markers {
        if let Some(start_idx) = text.find(start) {
            let content_start = start_idx + start.len();
            if let Some(end_idx) = text[content_start..].find("```") {
                let body = text[content_start..content_start + end_idx].trim();
                if let Ok(json) = serde_json::from_str(body) {
                    return Some(json);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn answer_schema() -> OutputSchema {
        OutputSchema::new(
            "answer",
            json!({
                "type": "object",
                "properties": { "answer": { "type": "string" } },
                "required": ["answer"],
                "additionalProperties": false
            }),
        )
        .unwrap()
    }

    #[test]
    fn accepts_conforming_value() {
        assert!(answer_schema().validate(&json!({"answer": "4"})).is_ok());
    }

    #[test]
    fn rejects_missing_and_extra_fields() {
        let schema = answer_schema();
        assert!(matches!(
            schema.validate(&json!({})),
            Err(ModelError::SchemaViolation { .. })
        ));
        assert!(schema.validate(&json!({"answer": "4", "confidence": 1})).is_err());
        assert!(schema.validate(&json!({"answer": 4})).is_err());
    }

    #[test]
    fn strict_schema_has_no_violations() {
        assert!(answer_schema().strict_violations().is_empty());

        let nullable = OutputSchema::new(
            "nullable",
            json!({
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": { "note": { "type": ["string", "null"] } },
                            "required": ["note"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["items"],
                "additionalProperties": false
            }),
        )
        .unwrap();
        assert!(nullable.strict_violations().is_empty());
    }

    #[test]
    fn open_objects_and_optional_fields_are_reported() {
        let schema = OutputSchema::new(
            "loose",
            json!({
                "type": "object",
                "properties": {
                    "verdicts": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": { "verdict": { "type": "string" }, "reason": { "type": "string" } },
                            "required": ["verdict"]
                        }
                    }
                },
                "required": ["verdicts"]
            }),
        )
        .unwrap();

        assert_eq!(
            schema.strict_violations(),
            vec![
                "loose: additionalProperties is not false".to_string(),
                "loose/verdicts/items: additionalProperties is not false".to_string(),
                "loose/verdicts/items: property 'reason' is not required".to_string(),
            ]
        );
    }

    #[test]
    fn parses_fenced_json() {
        let value = answer_schema().parse("Sure:\n```json\n{\"answer\": \"blue\"}\n```").unwrap();
        assert_eq!(value["answer"], "blue");
    }

    #[test]
    fn plain_text_is_a_violation() {
        assert!(matches!(
            answer_schema().parse("the answer is blue"),
            Err(ModelError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn invalid_schema_fails_at_construction() {
        let err = OutputSchema::new("bad", json!({"type": "no-such-type"})).unwrap_err();
        assert!(matches!(err, ModelError::InvalidSchema(_)));
    }
}
