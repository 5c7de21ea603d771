//! Agent protocol definitions.
//!
//! The decision oracle is the model-driven side of the loop: given the goal,
//! the available tools and every prior turn, it either answers or asks for a
//! tool call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::tool::{ToolCall, ToolDescriptor, ToolResult};

/// What the oracle wants to do next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    FinalAnswer { text: String },
    ToolCall { call: ToolCall },
}

impl Decision {
    pub fn final_answer(text: impl Into<String>) -> Self {
        Decision::FinalAnswer { text: text.into() }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Decision::ToolCall { call }
    }
}

/// One decide -> (call) -> observe cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTurn {
    /// 1-based, strictly increasing.
    pub number: u32,

    pub decision: Decision,

    /// Outcome of the call; `None` for a final-answer turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
}

/// Everything the oracle sees when deciding.
#[derive(Debug, Clone, Copy)]
pub struct OracleContext<'a> {
    pub goal: &'a str,
    pub instructions: Option<&'a str>,
    pub tools: &'a [ToolDescriptor],
    pub turns: &'a [AgentTurn],
}

impl OracleContext<'_> {
    /// Number of the turn being decided.
    pub fn current_turn(&self) -> u32 {
        self.turns.len() as u32 + 1
    }
}

/// Model-driven decision maker.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Returns the next action for the given context.
    async fn decide(&self, ctx: &OracleContext<'_>) -> Result<Decision, OracleError>;
}

/// Terminal output of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Final answer produced by the oracle.
    pub answer: String,

    /// Identifier for resuming the tool server's session later.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// The conversation trace.
    pub turns: Vec<AgentTurn>,
}
