//! Error types for the toolrelay protocol layer.

mod agent;
mod oracle;
mod tool_server;

pub use agent::*;
pub use oracle::*;
pub use tool_server::*;
