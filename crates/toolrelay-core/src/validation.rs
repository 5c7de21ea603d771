//! Argument validation against a tool's parameter schema.

use serde_json::{Map, Value};
use toolrelay_protocols::ToolDescriptor;
use tracing::warn;

use crate::error::InvalidArguments;

/// Check `arguments` against the descriptor's JSON Schema.
///
/// Descriptors without a schema accept any object. Every violation is
/// reported, not just the first one.
pub fn validate_arguments(
    descriptor: &ToolDescriptor,
    arguments: &Map<String, Value>,
) -> Result<(), InvalidArguments> {
    if descriptor.parameters_schema.is_none() {
        return Ok(());
    }

    let schema = descriptor.json_schema();
    let validator = match jsonschema::Validator::new(&schema) {
        Ok(validator) => validator,
        Err(e) => {
            // The call still goes out; the server is the authority on its own schema.
            warn!(tool = %descriptor.name, error = %e, "Tool advertised an unusable schema");
            return Ok(());
        }
    };

    let instance = Value::Object(arguments.clone());
    let violations: Vec<String> = validator
        .iter_errors(&instance)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{path}: {e}")
            }
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(InvalidArguments {
            tool: descriptor.name.clone(),
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test arguments must be an object"),
        }
    }

    #[test]
    fn test_no_schema_accepts_anything() {
        let tool = ToolDescriptor::new("free", "");
        assert!(validate_arguments(&tool, &args(json!({"x": 1, "y": [true]}))).is_ok());
    }

    #[test]
    fn test_short_form_schema_accepts_match() {
        let tool = ToolDescriptor::new("echo", "").with_parameters_schema(json!({"text": "string"}));
        assert!(validate_arguments(&tool, &args(json!({"text": "hi"}))).is_ok());
    }

    #[test]
    fn test_short_form_schema_rejects_wrong_type() {
        let tool = ToolDescriptor::new("echo", "").with_parameters_schema(json!({"text": "string"}));
        let err = validate_arguments(&tool, &args(json!({"text": 42}))).unwrap_err();
        assert_eq!(err.tool, "echo");
        assert_eq!(err.violations.len(), 1);
        assert!(err.violations[0].starts_with("/text"));
    }

    #[test]
    fn test_missing_required_property() {
        let tool = ToolDescriptor::new("echo", "").with_parameters_schema(json!({"text": "string"}));
        let err = validate_arguments(&tool, &args(json!({}))).unwrap_err();
        assert!(err.violations[0].contains("text"));
    }

    #[test]
    fn test_reports_every_violation() {
        let tool = ToolDescriptor::new("pair", "").with_parameters_schema(json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "boolean"}
            },
            "required": ["a", "b"]
        }));
        let err = validate_arguments(&tool, &args(json!({"a": "one", "b": "yes"}))).unwrap_err();
        assert_eq!(err.violations.len(), 2);
    }

    #[test]
    fn test_full_schema_optional_properties() {
        let tool = ToolDescriptor::new("codex", "").with_parameters_schema(json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string"},
                "cwd": {"type": "string"}
            },
            "required": ["prompt"]
        }));
        assert!(validate_arguments(&tool, &args(json!({"prompt": "fix it"}))).is_ok());
    }

    #[test]
    fn test_unusable_schema_is_not_enforced() {
        let tool = ToolDescriptor::new("odd", "")
            .with_parameters_schema(json!({"type": "object", "minProperties": "three"}));
        assert!(validate_arguments(&tool, &args(json!({}))).is_ok());
    }
}
