//! CLI definitions for toolrelay.

use std::path::PathBuf;

use clap::Parser;

use toolrelay_config::{ApprovalPolicy, RunConfig, SandboxMode};

/// toolrelay CLI.
#[derive(Parser, Debug)]
#[command(name = "toolrelay")]
#[command(about = "Let a model drive a sandboxed coding tool server until the task is done")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.toolrelay/config.toml)
    #[arg(short, long, env = "TOOLRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Working directory handed to the tool server
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Sandbox mode (read-only, workspace-write, danger-full-access)
    #[arg(long)]
    pub sandbox: Option<SandboxMode>,

    /// Approval policy (never, on-failure, on-request, untrusted)
    #[arg(long = "approval-policy")]
    pub approval_policy: Option<ApprovalPolicy>,

    /// Seconds of server silence tolerated during a tool call
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Seconds allowed for a single tool call
    #[arg(long)]
    pub call_timeout: Option<u64>,

    /// Kill the tool server when it goes silent
    #[arg(long)]
    pub abort_on_idle: bool,

    /// Maximum number of agent turns
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Continue an earlier tool server thread
    #[arg(long)]
    pub resume: Option<String>,

    /// Model used for decisions
    #[arg(long, env = "OPENAI_MODEL")]
    pub model: Option<String>,

    /// Do not print tool server events
    #[arg(short, long)]
    pub quiet: bool,

    /// What the agent should do
    #[arg(required = true, trailing_var_arg = true, num_args = 1..)]
    pub prompt: Vec<String>,
}

impl Cli {
    pub fn prompt(&self) -> String {
        self.prompt.join(" ")
    }

    /// Overlay flags on top of file configuration.
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(cwd) = &self.cwd {
            config.cwd = cwd.clone();
        }
        if let Some(sandbox) = self.sandbox {
            config.sandbox = sandbox;
        }
        if let Some(policy) = self.approval_policy {
            config.approval_policy = policy;
        }
        if let Some(seconds) = self.idle_timeout {
            config.timeouts.idle_seconds = seconds;
        }
        if let Some(seconds) = self.call_timeout {
            config.timeouts.call_seconds = seconds;
        }
        if self.abort_on_idle {
            config.timeouts.abort_on_idle = true;
        }
        if let Some(max_turns) = self.max_turns {
            config.agent.max_turns = max_turns;
        }
        if let Some(model) = &self.model {
            config.oracle.model = model.clone();
        }
    }
}
