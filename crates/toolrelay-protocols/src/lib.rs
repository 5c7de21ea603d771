//! # toolrelay protocols
//!
//! Shared types and trait seams for the toolrelay runtime.
//! Contains only definitions - no I/O.
//!
//! ## Core Traits
//!
//! - [`ToolInvoker`] - Dispatches a validated tool call to whatever serves it
//! - [`DecisionOracle`] - Chooses, per turn, to answer or to call a tool
//! - [`ProgressObserver`] - Receives progress events as they happen

pub mod agent;
pub mod error;
pub mod event;
pub mod tool;

pub use agent::{AgentTurn, Decision, DecisionOracle, OracleContext, RunResult};
pub use error::{AgentError, OracleError, TimeoutKind, ToolServerError};
pub use event::{NoopObserver, ProgressEvent, ProgressObserver};
pub use tool::{FailureReason, ToolCall, ToolDescriptor, ToolFailure, ToolInvoker, ToolResult};
