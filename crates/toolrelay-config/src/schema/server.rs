//! Tool server launch configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A tool server subprocess to spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Name used in logs, errors and tool attribution.
    pub name: String,

    /// Executable to run.
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the subprocess; defaults to the run's `cwd`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Pass the whole parent environment through.
    #[serde(default = "default_inherit_env")]
    pub inherit_env: bool,

    /// Parent variables copied through when `inherit_env` is off.
    #[serde(default)]
    pub propagate_env: Vec<String>,

    /// Explicit variables set on the subprocess, applied last.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_inherit_env() -> bool {
    true
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            inherit_env: true,
            propagate_env: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// The Codex CLI running as a tool server.
    pub fn codex() -> Self {
        Self::new("codex", "codex").with_args(["mcp-server"])
    }
}

/// The exact environment a subprocess starts with.
///
/// Built once from configuration; the transport clears the child's
/// environment and applies `vars` verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvOverlay {
    /// Overlay from an explicit parent snapshot.
    pub fn build(
        parent: impl IntoIterator<Item = (String, String)>,
        server: &ServerConfig,
    ) -> Self {
        let mut vars = BTreeMap::new();
        for (key, value) in parent {
            if server.inherit_env || server.propagate_env.iter().any(|name| *name == key) {
                vars.insert(key, value);
            }
        }
        for (key, value) in &server.env {
            vars.insert(key.clone(), value.clone());
        }
        Self { vars }
    }

    /// Overlay using the current process environment as the parent.
    pub fn from_process(server: &ServerConfig) -> Self {
        Self::build(std::env::vars(), server)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Everything needed to spawn one tool server.
#[derive(Debug, Clone)]
pub struct ServerLaunch {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: EnvOverlay,
}

impl ServerLaunch {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            cwd: PathBuf::from("."),
            env: EnvOverlay::default(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, env: EnvOverlay) -> Self {
        self.env = env;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Command line for logs.
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
