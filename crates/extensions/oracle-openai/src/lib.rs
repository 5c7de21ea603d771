//! Decision oracle backed by an OpenAI-compatible chat-completions API.
//!
//! Tool descriptors are offered as function tools; the model's first tool
//! call becomes the next [`Decision`](toolrelay_protocols::Decision), and a
//! plain reply becomes the final answer.

mod api;
mod converter;
mod oracle;

pub use oracle::{DEFAULT_BASE_URL, OpenAiOracle};
