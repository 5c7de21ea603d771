//! Tool execution result types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata map type.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Machine-readable reason a tool call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The oracle named a tool that was never discovered.
    UnknownTool,
    /// Arguments did not satisfy the tool's schema.
    InvalidArguments,
    /// The tool ran and reported an error itself.
    ToolReported,
    /// The server answered the request with a JSON-RPC error.
    Rpc,
    /// No response arrived in time.
    Timeout,
    /// The server's response could not be understood.
    Protocol,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::UnknownTool => "unknown_tool",
            FailureReason::InvalidArguments => "invalid_arguments",
            FailureReason::ToolReported => "tool_reported",
            FailureReason::Rpc => "rpc",
            FailureReason::Timeout => "timeout",
            FailureReason::Protocol => "protocol",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error payload of a failed tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub reason: FailureReason,
    pub message: String,
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the call succeeded.
    pub success: bool,

    /// Text output.
    pub content: String,

    /// Structured output (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<serde_json::Value>,

    /// Failure payload if the call failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,

    /// Additional metadata about the call.
    #[serde(default)]
    pub metadata: Metadata,
}

impl ToolResult {
    /// Create a successful result with text content.
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            structured_output: None,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a successful result with structured output.
    pub fn success_json(content: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            structured_output: Some(output),
            ..Self::success(content)
        }
    }

    /// Create a failed result.
    pub fn failure(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            structured_output: None,
            error: Some(ToolFailure {
                reason,
                message: message.into(),
            }),
            metadata: HashMap::new(),
        }
    }

    /// Attach text content (kept on failures, where servers often explain themselves).
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Attach structured output.
    pub fn with_structured_output(mut self, output: serde_json::Value) -> Self {
        self.structured_output = Some(output);
        self
    }

    /// Add metadata to the result.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Failure reason, if the call failed.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.error.as_ref().map(|e| e.reason)
    }

    /// Render the result as text for the oracle's context.
    pub fn to_context_text(&self) -> String {
        match &self.error {
            None => self.content.clone(),
            Some(failure) if self.content.is_empty() => {
                format!("Error ({}): {}", failure.reason, failure.message)
            }
            Some(failure) => format!(
                "Error ({}): {}\n{}",
                failure.reason, failure.message, self.content
            ),
        }
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
