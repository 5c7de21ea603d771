//! Run session orchestration.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toolrelay_agent_loop::{AgentLoop, LoopSettings};
use toolrelay_config::{ConfigValidator, RunConfig, ServerConfig};
use toolrelay_core::ToolRegistry;
use toolrelay_protocols::{
    DecisionOracle, NoopObserver, ProgressObserver, RunResult, ToolInvoker, ToolServerError,
};
use toolrelay_stdio_bridge::{ClientTimeouts, ProcessTransport, ToolServerClient, TransportError};

use crate::defaults::SessionDefaults;
use crate::error::RunError;
use crate::instructions::build_instructions;
use crate::thread::latest_thread_id;

/// One prompt's worth of work against the configured tool servers.
pub struct RunSession {
    config: RunConfig,
    oracle: Arc<dyn DecisionOracle>,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
}

impl RunSession {
    pub fn new(config: RunConfig, oracle: Arc<dyn DecisionOracle>) -> Self {
        Self {
            config,
            oracle,
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
        }
    }

    /// Receive server notifications and loop progress as they happen.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels the run when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run `goal` to completion.
    ///
    /// Every tool server started for the run is closed before this returns,
    /// on success and on every error path.
    pub async fn run(&self, goal: &str, resume: Option<String>) -> Result<RunResult, RunError> {
        let warnings = ConfigValidator::validate(&self.config).into_result()?;
        for warning in &warnings {
            warn!(path = %warning.path, "{}", warning.message);
        }
        let resume = resume.filter(|id| !id.trim().is_empty());
        info!(
            servers = self.config.servers.len(),
            resume = ?resume,
            cwd = %self.config.resolved_cwd().display(),
            "Starting run"
        );

        let mut clients = Vec::new();
        let outcome = self.execute(goal, resume.as_deref(), &mut clients).await;
        self.shutdown(&clients).await;

        match &outcome {
            Ok(result) => info!(
                turns = result.turns.len(),
                thread_id = ?result.thread_id,
                "Run finished"
            ),
            Err(e) => warn!(error = %e, "Run failed"),
        }
        outcome
    }

    async fn execute(
        &self,
        goal: &str,
        resume: Option<&str>,
        clients: &mut Vec<Arc<ToolServerClient>>,
    ) -> Result<RunResult, RunError> {
        let mut registry = ToolRegistry::new();
        let mut server_instructions = Vec::with_capacity(self.config.servers.len());

        for server in &self.config.servers {
            let client = self.start(server).await?;
            clients.push(Arc::clone(&client));

            let info = self.cancellable(client.initialize()).await?;
            let tools = self.cancellable(client.list_tools()).await?;
            info!(
                server = %server.name,
                server_name = ?info.name,
                tools = tools.len(),
                "Tool server ready"
            );
            registry = registry.merge(ToolRegistry::from_discovery(&server.name, tools)?)?;
            server_instructions.push((server.name.clone(), info.instructions));
        }

        let instructions = build_instructions(
            self.config.agent.instructions.as_deref(),
            &server_instructions,
            self.config.sandbox,
            self.config.approval_policy,
            &self.config.resolved_cwd(),
            resume,
        );
        let settings = LoopSettings {
            max_turns: self.config.agent.max_turns,
            max_consecutive_timeouts: self.config.agent.max_consecutive_timeouts,
            call_timeout: self.config.timeouts.call(),
        };

        let mut agent = AgentLoop::new(Arc::clone(&self.oracle), Arc::new(registry), settings)
            .with_defaults(Arc::new(SessionDefaults::from_config(&self.config, resume)))
            .with_observer(Arc::clone(&self.observer))
            .with_cancellation(self.cancel.clone());
        if let Some(text) = instructions {
            agent = agent.with_instructions(text);
        }
        for client in clients.iter() {
            let invoker: Arc<dyn ToolInvoker> = client.clone();
            agent = agent.with_invoker(invoker);
        }

        let mut result = agent.run(goal).await?;
        result.thread_id = latest_thread_id(&result.turns).or_else(|| resume.map(str::to_string));
        Ok(result)
    }

    async fn start(&self, server: &ServerConfig) -> Result<Arc<ToolServerClient>, RunError> {
        if self.cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        let launch = self.config.launch_for(server);
        let transport = ProcessTransport::start(&launch)
            .await
            .map_err(|e| match e {
                TransportError::SpawnFailed { command, source } => ToolServerError::SpawnFailed {
                    server: server.name.clone(),
                    command,
                    source,
                },
                other => ToolServerError::Protocol {
                    server: server.name.clone(),
                    message: other.to_string(),
                },
            })?
            .with_close_grace(self.config.timeouts.close_grace());

        let client = ToolServerClient::connect(
            &server.name,
            Arc::new(transport),
            ClientTimeouts::from(&self.config.timeouts),
        );
        client.set_observer(Arc::clone(&self.observer));
        Ok(Arc::new(client))
    }

    async fn cancellable<T>(
        &self,
        operation: impl Future<Output = Result<T, ToolServerError>>,
    ) -> Result<T, RunError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RunError::Cancelled),
            outcome = operation => outcome.map_err(RunError::from),
        }
    }

    async fn shutdown(&self, clients: &[Arc<ToolServerClient>]) {
        futures::future::join_all(clients.iter().map(|client| client.close())).await;
        debug!(servers = clients.len(), "Closed tool servers");
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
