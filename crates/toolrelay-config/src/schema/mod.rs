//! Configuration schema definitions.

mod policy;
mod server;

pub use policy::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub sandbox: SandboxMode,

    #[serde(default)]
    pub approval_policy: ApprovalPolicy,

    /// Directory the tool servers work in.
    #[serde(default = "default_cwd")]
    pub cwd: PathBuf,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default = "default_servers")]
    pub servers: Vec<ServerConfig>,

    #[serde(default)]
    pub oracle: OracleConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxMode::default(),
            approval_policy: ApprovalPolicy::default(),
            cwd: default_cwd(),
            timeouts: TimeoutConfig::default(),
            agent: AgentSettings::default(),
            servers: default_servers(),
            oracle: OracleConfig::default(),
        }
    }
}

fn default_cwd() -> PathBuf {
    PathBuf::from(".")
}

fn default_servers() -> Vec<ServerConfig> {
    vec![ServerConfig::codex()]
}

impl RunConfig {
    /// Working directory with `~` expanded.
    pub fn resolved_cwd(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.cwd.to_string_lossy()).as_ref())
    }

    /// Launch description for a configured server.
    ///
    /// This is the one place the parent environment is read.
    pub fn launch_for(&self, server: &ServerConfig) -> ServerLaunch {
        let cwd = server
            .cwd
            .as_ref()
            .map(|dir| PathBuf::from(shellexpand::tilde(&dir.to_string_lossy()).as_ref()))
            .unwrap_or_else(|| self.resolved_cwd());
        ServerLaunch {
            name: server.name.clone(),
            command: server.command.clone(),
            args: server.args.clone(),
            cwd,
            env: EnvOverlay::from_process(server),
        }
    }
}

/// Time budgets enforced by the tool server client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Budget for one tool call.
    #[serde(default = "default_call_seconds")]
    pub call_seconds: u64,

    /// Longest silence tolerated while a call is outstanding.
    #[serde(default = "default_idle_seconds")]
    pub idle_seconds: u64,

    /// Budget for the handshake and tool discovery.
    #[serde(default = "default_session_seconds")]
    pub session_seconds: u64,

    /// Kill the subprocess when the idle window expires.
    #[serde(default)]
    pub abort_on_idle: bool,

    /// How long `close` waits for the subprocess to exit after killing it.
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_seconds: default_call_seconds(),
            idle_seconds: default_idle_seconds(),
            session_seconds: default_session_seconds(),
            abort_on_idle: false,
            close_grace_ms: default_close_grace_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn call(&self) -> Duration {
        Duration::from_secs(self.call_seconds)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_seconds)
    }

    pub fn session(&self) -> Duration {
        Duration::from_secs(self.session_seconds)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

fn default_call_seconds() -> u64 {
    600
}

fn default_idle_seconds() -> u64 {
    60
}

fn default_session_seconds() -> u64 {
    300
}

fn default_close_grace_ms() -> u64 {
    2000
}

/// Agent loop limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Consecutive tool call timeouts tolerated before the run fails.
    #[serde(default = "default_max_consecutive_timeouts")]
    pub max_consecutive_timeouts: u32,

    /// Extra instructions prepended to the oracle's context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_consecutive_timeouts: default_max_consecutive_timeouts(),
            instructions: None,
        }
    }
}

fn default_max_turns() -> u32 {
    30
}

fn default_max_consecutive_timeouts() -> u32 {
    2
}

/// Decision oracle endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: None,
        }
    }
}

fn default_model() -> String {
    "gpt-4.1".to_string()
}

/// Default config file location (`~/.toolrelay/config.toml`).
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".toolrelay")
        .join("config.toml")
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
