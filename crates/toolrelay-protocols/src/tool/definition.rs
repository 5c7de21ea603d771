//! Tool descriptor types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Description of one tool offered by a tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Name the oracle uses to call the tool. Unique within a registry.
    pub name: String,

    /// Description of what the tool does.
    #[serde(default)]
    pub description: String,

    /// Parameter schema, as advertised by the server.
    #[serde(
        default,
        rename = "inputSchema",
        alias = "input_schema",
        alias = "schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub parameters_schema: Option<Value>,

    /// Name of the tool server that provides this tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

impl ToolDescriptor {
    /// Create a new tool descriptor.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema: None,
            server: None,
        }
    }

    /// Set the parameters schema.
    pub fn with_parameters_schema(mut self, schema: Value) -> Self {
        self.parameters_schema = Some(schema);
        self
    }

    /// Attribute the tool to a server.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// The parameter schema as a full JSON Schema object.
    ///
    /// Servers may advertise a short form mapping argument names to type
    /// names (`{"text": "string"}`); that form is expanded into an object
    /// schema whose listed properties are all required.
    pub fn json_schema(&self) -> Value {
        match &self.parameters_schema {
            None => empty_object_schema(),
            Some(Value::Object(map)) if is_short_form(map) => {
                let properties: Map<String, Value> = map
                    .iter()
                    .map(|(name, ty)| (name.clone(), json!({ "type": ty })))
                    .collect();
                let required: Vec<Value> = map.keys().cloned().map(Value::String).collect();
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required
                })
            }
            Some(schema) => schema.clone(),
        }
    }

    /// Whether the schema declares a property with the given name.
    pub fn declares_property(&self, property: &str) -> bool {
        self.json_schema()
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|props| props.contains_key(property))
    }

    /// Convert to OpenAI function calling format.
    pub fn to_openai_function(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.json_schema()
            }
        })
    }
}

const SIMPLE_TYPES: [&str; 7] = [
    "string", "number", "integer", "boolean", "object", "array", "null",
];

fn is_short_form(map: &Map<String, Value>) -> bool {
    !map.is_empty()
        && !map.contains_key("type")
        && !map.contains_key("properties")
        && map
            .values()
            .all(|v| v.as_str().is_some_and(|t| SIMPLE_TYPES.contains(&t)))
}

fn empty_object_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_short_form_schema() {
        let raw = json!({"name": "echo", "schema": {"text": "string"}});
        let tool: ToolDescriptor = serde_json::from_value(raw).unwrap();
        assert_eq!(tool.name, "echo");
        assert!(tool.description.is_empty());

        let schema = tool.json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["required"], json!(["text"]));
    }

    #[test]
    fn test_descriptor_from_mcp_input_schema() {
        let raw = json!({
            "name": "codex",
            "description": "Run a Codex session",
            "inputSchema": {"type": "object", "properties": {"prompt": {"type": "string"}}}
        });
        let tool: ToolDescriptor = serde_json::from_value(raw).unwrap();
        assert_eq!(tool.description, "Run a Codex session");
        assert!(tool.declares_property("prompt"));
        assert!(!tool.declares_property("cwd"));
    }

    #[test]
    fn test_missing_schema_is_empty_object() {
        let tool = ToolDescriptor::new("noop", "does nothing");
        assert_eq!(tool.json_schema()["type"], "object");
        assert!(!tool.declares_property("anything"));
    }

    #[test]
    fn test_full_schema_is_not_rewritten() {
        let schema = json!({"type": "object", "properties": {"n": {"type": "integer"}}});
        let tool = ToolDescriptor::new("count", "").with_parameters_schema(schema.clone());
        assert_eq!(tool.json_schema(), schema);
    }

    #[test]
    fn test_to_openai_function() {
        let tool = ToolDescriptor::new("echo", "Echo text")
            .with_parameters_schema(json!({"text": "string"}));
        let function = tool.to_openai_function();
        assert_eq!(function["type"], "function");
        assert_eq!(function["function"]["name"], "echo");
        assert_eq!(function["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_serialization_uses_input_schema_key() {
        let tool = ToolDescriptor::new("echo", "").with_parameters_schema(json!({"type": "object"}));
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("inputSchema"));
        assert!(!json.contains("server"));
    }
}
