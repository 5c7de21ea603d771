//! Tool call requested by the decision oracle.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool name plus named arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Local call identifier; never sent to the tool server.
    pub id: String,

    /// Name of the tool to call.
    pub name: String,

    /// Argument values keyed by argument name.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a call with a generated identifier.
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }

    /// Override the call identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Build a call from a JSON value, which must be an object (or null).
    pub fn from_value(name: impl Into<String>, arguments: Value) -> Option<Self> {
        match arguments {
            Value::Object(map) => Some(Self::new(name, map)),
            Value::Null => Some(Self::new(name, Map::new())),
            _ => None,
        }
    }

    /// Arguments as a JSON object value.
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}
