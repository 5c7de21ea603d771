//! Agent loop executor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toolrelay_core::{ToolRegistry, validate_arguments};
use toolrelay_protocols::{
    AgentError, AgentTurn, Decision, DecisionOracle, FailureReason, NoopObserver, OracleContext,
    ProgressEvent, ProgressObserver, RunResult, ToolCall, ToolInvoker, ToolResult,
    ToolServerError,
};

use crate::defaults::{ArgumentDefaults, NoDefaults};
use crate::state::LoopState;

/// How long a cancelled call may take to wind down before it is dropped.
const CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Budgets for one run of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Most turns the loop may take, the final-answer turn included.
    pub max_turns: u32,
    /// Consecutive timed-out calls after which the run fails.
    pub max_consecutive_timeouts: u32,
    /// Budget handed to every tool call.
    pub call_timeout: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_turns: 30,
            max_consecutive_timeouts: 2,
            call_timeout: Duration::from_secs(600),
        }
    }
}

/// Sequential decide -> call -> observe loop.
///
/// One call is outstanding at a time, and its result is in the trace before
/// the oracle is asked again.
pub struct AgentLoop {
    oracle: Arc<dyn DecisionOracle>,
    registry: Arc<ToolRegistry>,
    invokers: HashMap<String, Arc<dyn ToolInvoker>>,
    settings: LoopSettings,
    instructions: Option<String>,
    defaults: Arc<dyn ArgumentDefaults>,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
    state: Mutex<LoopState>,
}

impl AgentLoop {
    pub fn new(
        oracle: Arc<dyn DecisionOracle>,
        registry: Arc<ToolRegistry>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            oracle,
            registry,
            invokers: HashMap::new(),
            settings,
            instructions: None,
            defaults: Arc::new(NoDefaults),
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
            state: Mutex::new(LoopState::Idle),
        }
    }

    /// Route calls for tools attributed to `invoker.server_name()` through it.
    pub fn with_invoker(mut self, invoker: Arc<dyn ToolInvoker>) -> Self {
        self.invokers
            .insert(invoker.server_name().to_string(), invoker);
        self
    }

    /// Extra text shown to the oracle alongside the goal.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_defaults(mut self, defaults: Arc<dyn ArgumentDefaults>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Current state.
    pub fn state(&self) -> LoopState {
        *self.state.lock()
    }

    /// Run the loop until the oracle answers or the run fails.
    pub async fn run(&self, goal: &str) -> Result<RunResult, AgentError> {
        info!(
            tools = self.registry.len(),
            max_turns = self.settings.max_turns,
            "Agent loop starting"
        );
        let outcome = self.drive(goal).await;
        match &outcome {
            Ok(result) => {
                self.transition(LoopState::Finished);
                info!(turns = result.turns.len(), "Agent loop finished");
            }
            Err(e) => {
                self.transition(LoopState::Failed);
                warn!(error = %e, "Agent loop failed");
            }
        }
        outcome
    }

    async fn drive(&self, goal: &str) -> Result<RunResult, AgentError> {
        let mut turns: Vec<AgentTurn> = Vec::new();
        let mut consecutive_timeouts = 0u32;

        loop {
            self.transition(LoopState::Deciding);
            if self.cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let number = turns.len() as u32 + 1;
            if number > self.settings.max_turns {
                return Err(AgentError::TurnBudgetExceeded(self.settings.max_turns));
            }
            debug!(turn = number, max_turns = self.settings.max_turns, "Agent turn");
            self.observer.on_event(&ProgressEvent::TurnStarted { turn: number });

            let decision = {
                let ctx = OracleContext {
                    goal,
                    instructions: self.instructions.as_deref(),
                    tools: self.registry.describe_all(),
                    turns: &turns,
                };
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
                    decision = self.oracle.decide(&ctx) => decision?,
                }
            };

            match decision {
                Decision::FinalAnswer { text } => {
                    self.transition(LoopState::Responding);
                    turns.push(AgentTurn {
                        number,
                        decision: Decision::final_answer(text.clone()),
                        result: None,
                    });
                    self.observer.on_event(&ProgressEvent::Finished { turns: number });
                    return Ok(RunResult {
                        answer: text,
                        thread_id: None,
                        turns,
                    });
                }
                Decision::ToolCall { call } => {
                    self.transition(LoopState::Calling);
                    let (call, result) = self
                        .call(number, call, &mut consecutive_timeouts)
                        .await?;
                    self.observer.on_event(&ProgressEvent::ToolCallFinished {
                        turn: number,
                        tool: call.name.clone(),
                        result: result.clone(),
                    });
                    turns.push(AgentTurn {
                        number,
                        decision: Decision::tool_call(call),
                        result: Some(result),
                    });
                }
            }
        }
    }

    /// Resolve one requested call to a result, or to a run-ending error.
    async fn call(
        &self,
        turn: u32,
        mut call: ToolCall,
        consecutive_timeouts: &mut u32,
    ) -> Result<(ToolCall, ToolResult), AgentError> {
        let Some(descriptor) = self.registry.lookup(&call.name) else {
            warn!(turn, tool = %call.name, "Oracle asked for an unknown tool");
            let message = format!("Unknown tool '{}'", call.name);
            return Ok((call, ToolResult::failure(FailureReason::UnknownTool, message)));
        };

        self.defaults.fill(descriptor, &mut call.arguments);
        if let Err(invalid) = validate_arguments(descriptor, &call.arguments) {
            warn!(turn, tool = %call.name, error = %invalid, "Rejected tool arguments");
            return Ok((
                call,
                ToolResult::failure(FailureReason::InvalidArguments, invalid.to_string()),
            ));
        }

        let server = descriptor.server.as_deref().unwrap_or_default();
        let invoker = self
            .invokers
            .get(server)
            .ok_or_else(|| AgentError::MissingServer(call.name.clone()))?;

        info!(turn, tool = %call.name, server = %server, "Dispatching tool call");
        self.observer.on_event(&ProgressEvent::ToolCallStarted {
            turn,
            call: call.clone(),
        });

        let outcome = {
            let invocation = invoker.invoke(&call, self.settings.call_timeout, &self.cancel);
            tokio::pin!(invocation);
            tokio::select! {
                outcome = &mut invocation => outcome,
                _ = self.cancel.cancelled() => {
                    if tokio::time::timeout(CANCEL_GRACE, &mut invocation).await.is_err() {
                        warn!(turn, tool = %call.name, "Tool call ignored cancellation");
                    }
                    Err(ToolServerError::Cancelled)
                }
            }
        };

        let result = match outcome {
            Ok(result) => {
                *consecutive_timeouts = 0;
                debug!(turn, tool = %call.name, success = result.success, "Tool call resolved");
                result
            }
            Err(e) if e.is_timeout() => {
                *consecutive_timeouts += 1;
                warn!(
                    turn,
                    tool = %call.name,
                    consecutive = *consecutive_timeouts,
                    error = %e,
                    "Tool call timed out"
                );
                if *consecutive_timeouts >= self.settings.max_consecutive_timeouts {
                    return Err(e.into());
                }
                ToolResult::failure(FailureReason::Timeout, e.to_string())
            }
            Err(ToolServerError::Cancelled) => return Err(AgentError::Cancelled),
            Err(e) if e.is_session_fatal() || matches!(e, ToolServerError::WriteFailed { .. }) => {
                return Err(e.into());
            }
            Err(e) => {
                *consecutive_timeouts = 0;
                warn!(turn, tool = %call.name, error = %e, "Tool call failed");
                ToolResult::failure(failure_reason(&e), e.to_string())
            }
        };
        Ok((call, result))
    }

    fn transition(&self, next: LoopState) {
        let mut state = self.state.lock();
        if *state != next {
            debug!(from = %*state, to = %next, "Agent loop transition");
            *state = next;
        }
    }
}

fn failure_reason(error: &ToolServerError) -> FailureReason {
    match error {
        ToolServerError::UnknownTool(_) => FailureReason::UnknownTool,
        ToolServerError::Rpc { .. } => FailureReason::Rpc,
        ToolServerError::Timeout { .. } => FailureReason::Timeout,
        _ => FailureReason::Protocol,
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
