//! Agent loop for toolrelay.
//!
//! Drives the decision oracle turn by turn, dispatching each requested tool
//! call to the server that provides it and feeding the result back.

mod defaults;
mod executor;
mod state;

pub use defaults::{ArgumentDefaults, NoDefaults};
pub use executor::{AgentLoop, LoopSettings};
pub use state::LoopState;
