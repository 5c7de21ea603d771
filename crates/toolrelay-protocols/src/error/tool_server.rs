//! Tool server errors.

use std::time::Duration;

use thiserror::Error;

/// Which deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// The per-call budget elapsed.
    Call,
    /// No message of any kind arrived within the idle window.
    Idle,
    /// Session establishment (handshake or discovery) took too long.
    Session,
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutKind::Call => f.write_str("call timeout"),
            TimeoutKind::Idle => f.write_str("idle timeout"),
            TimeoutKind::Session => f.write_str("session timeout"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolServerError {
    #[error("Failed to spawn tool server '{server}' ({command}): {source}")]
    SpawnFailed {
        server: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to tool server '{server}': {message}")]
    WriteFailed { server: String, message: String },

    #[error("Protocol error from tool server '{server}': {message}")]
    Protocol { server: String, message: String },

    #[error("{method} on tool server '{server}' timed out after {}ms ({kind})", .timeout.as_millis())]
    Timeout {
        server: String,
        method: String,
        kind: TimeoutKind,
        timeout: Duration,
    },

    #[error("Tool server '{server}' is unavailable ({}): {detail}", describe_exit(.exit_code))]
    SubprocessCrashed {
        server: String,
        exit_code: Option<i32>,
        detail: String,
    },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool server '{server}' returned error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("Operation was cancelled")]
    Cancelled,
}

impl ToolServerError {
    /// Errors after which the session cannot continue.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            ToolServerError::SpawnFailed { .. }
                | ToolServerError::SubprocessCrashed { .. }
                | ToolServerError::Cancelled
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolServerError::Timeout { .. })
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    }
}
