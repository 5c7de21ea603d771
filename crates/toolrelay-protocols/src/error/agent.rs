//! Agent loop errors.

use thiserror::Error;

use super::{OracleError, ToolServerError};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Turn budget exceeded after {0} turns")]
    TurnBudgetExceeded(u32),

    #[error("Tool server failure: {0}")]
    ToolServer(#[from] ToolServerError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("No tool server is attached for '{0}'")]
    MissingServer(String),

    #[error("Agent run was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_turn_budget() {
        let err = AgentError::TurnBudgetExceeded(30);
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn test_agent_error_from_tool_server() {
        let err = AgentError::from(ToolServerError::Cancelled);
        assert!(matches!(err, AgentError::ToolServer(ToolServerError::Cancelled)));
    }

    #[test]
    fn test_agent_error_from_oracle() {
        let err = AgentError::from(OracleError::Request("connection reset".to_string()));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_agent_error_cancelled() {
        assert!(AgentError::Cancelled.to_string().contains("cancelled"));
    }
}
