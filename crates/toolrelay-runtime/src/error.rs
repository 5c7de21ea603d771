//! Session-level errors.

use thiserror::Error;

use toolrelay_config::ConfigError;
use toolrelay_core::RegistryError;
use toolrelay_protocols::{AgentError, ToolServerError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tool registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    ToolServer(#[from] ToolServerError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Run was cancelled")]
    Cancelled,
}

impl RunError {
    /// Whether the run ended because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            RunError::Cancelled
                | RunError::Agent(AgentError::Cancelled)
                | RunError::ToolServer(ToolServerError::Cancelled)
                | RunError::Agent(AgentError::ToolServer(ToolServerError::Cancelled))
        )
    }
}
