//! JSON-RPC tool servers over subprocess stdio.
//!
//! A [`ProcessTransport`] owns the subprocess and its pipes, framing stdout
//! with [`LineFrameCodec`]. A [`ToolServerClient`] runs the MCP handshake,
//! discovers tools and correlates `tools/call` requests with responses while
//! forwarding notifications as progress events.

mod client;
mod codec;
mod protocol;
mod transport;

pub use client::{ClientTimeouts, ServerInfo, ToolServerClient};
pub use codec::LineFrameCodec;
pub use protocol::{
    CallToolResult, ContentBlock, Inbound, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, McpMethod, RequestId,
};
pub use transport::{ProcessTransport, Transport, TransportError};
