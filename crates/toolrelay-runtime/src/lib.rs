//! # toolrelay runtime
//!
//! One [`RunSession`] per prompt: spawn the configured tool servers, run the
//! handshake and discovery, drive the agent loop, and shut every server down
//! again whatever the outcome.

mod defaults;
mod error;
mod instructions;
mod session;
mod thread;

pub use defaults::SessionDefaults;
pub use error::RunError;
pub use instructions::build_instructions;
pub use session::RunSession;
pub use thread::{extract_thread_id, latest_thread_id};
