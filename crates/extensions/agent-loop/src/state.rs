//! Loop states.

use serde::Serialize;

/// Where the agent loop is in its decide -> call -> observe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Not started yet.
    Idle,
    /// Waiting for the oracle.
    Deciding,
    /// The oracle produced a final answer.
    Responding,
    /// A tool call is outstanding.
    Calling,
    Finished,
    Failed,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Idle => "idle",
            LoopState::Deciding => "deciding",
            LoopState::Responding => "responding",
            LoopState::Calling => "calling",
            LoopState::Finished => "finished",
            LoopState::Failed => "failed",
        }
    }

    /// Whether the loop has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Finished | LoopState::Failed)
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
