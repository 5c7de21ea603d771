//! Tool invocation trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{ToolCall, ToolResult};
use crate::error::ToolServerError;

/// Dispatches tool calls to the server that provides them.
///
/// Implementations must resolve every call to exactly one outcome: a
/// [`ToolResult`] (which may itself describe a failure) or an error.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Name of the server behind this invoker.
    fn server_name(&self) -> &str;

    /// Call a tool and wait for its result.
    async fn invoke(
        &self,
        call: &ToolCall,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, ToolServerError>;
}
