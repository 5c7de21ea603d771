//! Tool server client: handshake, discovery and correlated tool calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toolrelay_config::TimeoutConfig;
use toolrelay_protocols::{
    FailureReason, NoopObserver, ProgressEvent, ProgressObserver, TimeoutKind, ToolCall,
    ToolDescriptor, ToolInvoker, ToolResult, ToolServerError,
};

use crate::protocol::{
    CallToolResult, Inbound, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    McpMethod, PROTOCOL_VERSION,
};
use crate::transport::{Transport, TransportError};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const MAX_TOOL_PAGES: usize = 32;
const CANCEL_NOTICE_TIMEOUT: Duration = Duration::from_secs(1);
const READER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Time budgets for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    /// Default budget for `tools/call` when the caller passes none.
    pub call: Duration,
    /// Longest silence tolerated while a tool call is outstanding.
    pub idle: Option<Duration>,
    /// Budget for `initialize` and `tools/list`.
    pub session: Duration,
    /// Close the transport once the session degrades.
    pub abort_on_idle: bool,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl From<&TimeoutConfig> for ClientTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            call: config.call(),
            idle: Some(config.idle()),
            session: config.session(),
            abort_on_idle: config.abort_on_idle,
        }
    }
}

/// What the server said about itself during `initialize`.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub protocol_version: Option<String>,
    pub instructions: Option<String>,
    pub capabilities: Value,
}

impl ServerInfo {
    fn from_initialize(result: &Value) -> Self {
        let text = |pointer: &str| {
            result
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            name: text("/serverInfo/name"),
            version: text("/serverInfo/version"),
            protocol_version: text("/protocolVersion"),
            instructions: text("/instructions").filter(|s| !s.trim().is_empty()),
            capabilities: result.get("capabilities").cloned().unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone)]
enum SessionState {
    Open,
    /// The server stopped answering; the process may still be alive.
    Degraded(String),
    /// The stream ended or the client was closed.
    Closed(String),
}

type Responder = oneshot::Sender<Result<Value, ToolServerError>>;

/// Client for one tool server.
///
/// A background task reads every inbound frame: responses resolve the
/// matching pending request, notifications become [`ProgressEvent`]s and
/// server-initiated requests are answered. Calls may overlap; each one gets
/// a fresh correlation id.
pub struct ToolServerClient {
    inner: Arc<ClientInner>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

struct ClientInner {
    name: String,
    transport: Arc<dyn Transport>,
    timeouts: ClientTimeouts,
    next_id: AtomicI64,
    pending: Mutex<HashMap<i64, Responder>>,
    last_activity: Mutex<Instant>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<ProgressEvent>,
    observer: RwLock<Arc<dyn ProgressObserver>>,
    server_info: Mutex<Option<ServerInfo>>,
    tools: Mutex<Option<Vec<ToolDescriptor>>>,
    shutdown: CancellationToken,
}

impl ToolServerClient {
    /// Attach to a started transport and begin reading from it.
    pub fn connect(
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
        timeouts: ClientTimeouts,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(ClientInner {
            name: name.into(),
            transport,
            timeouts,
            next_id: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
            last_activity: Mutex::new(Instant::now()),
            state: Mutex::new(SessionState::Open),
            events,
            observer: RwLock::new(Arc::new(NoopObserver)),
            server_info: Mutex::new(None),
            tools: Mutex::new(None),
            shutdown: CancellationToken::new(),
        });
        let reader = tokio::spawn(Arc::clone(&inner).read_loop());
        Self {
            inner,
            reader: Mutex::new(Some(reader)),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn timeouts(&self) -> ClientTimeouts {
        self.inner.timeouts
    }

    /// Perform the `initialize` handshake.
    pub async fn initialize(&self) -> Result<ServerInfo, ToolServerError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "toolrelay",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        let result = self
            .inner
            .request(
                McpMethod::Initialize.as_str(),
                params,
                self.inner.timeouts.session,
                TimeoutKind::Session,
                None,
                &self.inner.shutdown,
            )
            .await?;

        let info = ServerInfo::from_initialize(&result);
        self.inner
            .write(&JsonRpcNotification::new(McpMethod::Initialized.as_str()))
            .await?;

        info!(
            server = %self.inner.name,
            server_name = ?info.name,
            protocol = ?info.protocol_version,
            "Tool server initialized"
        );
        *self.inner.server_info.lock() = Some(info.clone());
        Ok(info)
    }

    /// Server details recorded by [`initialize`](Self::initialize).
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.inner.server_info.lock().clone()
    }

    /// Usage instructions the server sent during the handshake.
    pub fn instructions(&self) -> Option<String> {
        self.inner
            .server_info
            .lock()
            .as_ref()
            .and_then(|info| info.instructions.clone())
    }

    /// Discover the server's tools. The first answer is cached.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolServerError> {
        if let Some(tools) = self.inner.tools.lock().clone() {
            return Ok(tools);
        }

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_TOOL_PAGES {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self
                .inner
                .request(
                    McpMethod::ListTools.as_str(),
                    params,
                    self.inner.timeouts.session,
                    TimeoutKind::Session,
                    None,
                    &self.inner.shutdown,
                )
                .await?;

            let entries = result.get("tools").and_then(Value::as_array).ok_or_else(|| {
                ToolServerError::Protocol {
                    server: self.inner.name.clone(),
                    message: "tools/list result has no tools array".to_string(),
                }
            })?;
            for entry in entries {
                match serde_json::from_value::<ToolDescriptor>(entry.clone()) {
                    Ok(descriptor) => tools.push(descriptor.with_server(&self.inner.name)),
                    Err(e) => warn!(
                        server = %self.inner.name,
                        error = %e,
                        "Skipping malformed tool descriptor"
                    ),
                }
            }

            cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        if cursor.is_some() {
            warn!(server = %self.inner.name, "Stopped following tools/list pages");
        }

        info!(
            server = %self.inner.name,
            count = tools.len(),
            tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "Discovered tools"
        );
        *self.inner.tools.lock() = Some(tools.clone());
        Ok(tools)
    }

    /// Call a tool and wait for its result.
    ///
    /// Fails without sending anything when the session is degraded or closed,
    /// or when discovery ran and `name` was not among the tools.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, ToolServerError> {
        self.inner.ensure_usable()?;
        if let Some(tools) = &*self.inner.tools.lock() {
            if !tools.iter().any(|t| t.name == name) {
                return Err(ToolServerError::UnknownTool(name.to_string()));
            }
        }

        let started = Instant::now();
        let params = json!({ "name": name, "arguments": arguments });
        let value = self
            .inner
            .request(
                McpMethod::CallTool.as_str(),
                params,
                timeout,
                TimeoutKind::Call,
                self.inner.timeouts.idle,
                cancel,
            )
            .await?;

        let result = tool_result_from(value).with_metadata("server", json!(self.inner.name));
        debug!(
            server = %self.inner.name,
            tool = name,
            success = result.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool call finished"
        );
        Ok(result)
    }

    /// Progress events from this server, starting now.
    pub fn stream_events(&self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let server = self.inner.name.clone();
        tokio_stream::StreamExt::filter_map(
            BroadcastStream::new(self.inner.events.subscribe()),
            move |item| match item {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(server = %server, skipped, "Progress subscriber fell behind");
                    None
                }
            },
        )
    }

    /// Register an observer called inline for every notification.
    pub fn set_observer(&self, observer: Arc<dyn ProgressObserver>) {
        *self.inner.observer.write() = observer;
    }

    /// Tools from the last successful discovery.
    pub fn cached_tools(&self) -> Option<Vec<ToolDescriptor>> {
        self.inner.tools.lock().clone()
    }

    pub fn is_degraded(&self) -> bool {
        matches!(*self.inner.state.lock(), SessionState::Degraded(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.inner.state.lock(), SessionState::Closed(_))
    }

    /// Close the session and its transport. Calling it again is a no-op.
    pub async fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            if !matches!(*state, SessionState::Closed(_)) {
                *state = SessionState::Closed("client closed the session".to_string());
            }
        }
        self.inner.shutdown.cancel();
        if let Err(e) = self.inner.transport.close().await {
            warn!(server = %self.inner.name, error = %e, "Failed to close transport");
        }

        let reader = self.reader.lock().take();
        if let Some(reader) = reader {
            if tokio::time::timeout(READER_SHUTDOWN_TIMEOUT, reader).await.is_err() {
                warn!(server = %self.inner.name, "Reader task did not stop after close");
            }
            debug!(server = %self.inner.name, "Tool server client closed");
        }
    }
}

impl Drop for ToolServerClient {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

#[async_trait]
impl ToolInvoker for ToolServerClient {
    fn server_name(&self) -> &str {
        &self.inner.name
    }

    async fn invoke(
        &self,
        call: &ToolCall,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, ToolServerError> {
        self.call_tool(&call.name, call.arguments.clone(), timeout, cancel)
            .await
    }
}

impl ClientInner {
    async fn request(
        &self,
        method: &str,
        params: Value,
        budget: Duration,
        kind: TimeoutKind,
        idle: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Value, ToolServerError> {
        self.ensure_usable()?;
        if cancel.is_cancelled() {
            return Err(ToolServerError::Cancelled);
        }

        let started = Instant::now();
        // A budget too large to represent is no deadline at all.
        let deadline = started.checked_add(budget);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = serde_json::to_vec(&JsonRpcRequest::new(id, method).with_params(params))
            .map_err(|e| self.protocol_error(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        let _registered = PendingGuard {
            pending: &self.pending,
            id,
        };
        // The reader marks the state closed before draining, so a request
        // registered after the drain is caught here.
        self.ensure_usable()?;

        debug!(server = %self.name, method, id, "Sending request");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.degrade(format!("{method} cancelled while the server was not reading"))
                    .await;
                return Err(ToolServerError::Cancelled);
            }
            _ = sleep_until(deadline) => {
                self.degrade(format!(
                    "{method} not accepted within {}ms",
                    budget.as_millis()
                ))
                .await;
                return Err(self.timed_out(method, kind, budget));
            }
            sent = self.transport.send(&frame) => {
                if let Err(e) = sent {
                    return Err(ToolServerError::WriteFailed {
                        server: self.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        self.wait_for_response(id, rx, method, started, deadline, budget, kind, idle, cancel)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn wait_for_response(
        &self,
        id: i64,
        mut rx: oneshot::Receiver<Result<Value, ToolServerError>>,
        method: &str,
        started: Instant,
        deadline: Option<Instant>,
        budget: Duration,
        kind: TimeoutKind,
        idle: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Value, ToolServerError> {
        loop {
            let quiet_since = (*self.last_activity.lock()).max(started);
            let idle_wake = idle.and_then(|window| quiet_since.checked_add(window));
            let wake = match (deadline, idle_wake) {
                (Some(deadline), Some(idle_wake)) => Some(deadline.min(idle_wake)),
                (deadline, idle_wake) => deadline.or(idle_wake),
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.abandon(id, "cancelled by client").await;
                    return Err(ToolServerError::Cancelled);
                }
                outcome = &mut rx => {
                    return match outcome {
                        Ok(result) => result,
                        Err(_) => Err(self.unavailable("response channel dropped")),
                    };
                }
                _ = sleep_until(wake) => {}
            }

            let now = Instant::now();
            let quiet_since = (*self.last_activity.lock()).max(started);
            if deadline.is_some_and(|deadline| now >= deadline) {
                self.abandon(id, "request timed out").await;
                if quiet_since <= started {
                    self.degrade(format!("no message during {}ms {method}", budget.as_millis()))
                        .await;
                }
                return Err(self.timed_out(method, kind, budget));
            }
            if let Some(window) = idle {
                if now.duration_since(quiet_since) >= window {
                    self.abandon(id, "idle timeout").await;
                    self.degrade(format!("silent for {}ms during {method}", window.as_millis()))
                        .await;
                    return Err(self.timed_out(method, TimeoutKind::Idle, window));
                }
            }
        }
    }

    fn timed_out(&self, method: &str, kind: TimeoutKind, timeout: Duration) -> ToolServerError {
        ToolServerError::Timeout {
            server: self.name.clone(),
            method: method.to_string(),
            kind,
            timeout,
        }
    }

    /// Forget a pending request and tell the server we no longer want it.
    async fn abandon(&self, id: i64, reason: &str) {
        self.pending.lock().remove(&id);
        if matches!(*self.state.lock(), SessionState::Closed(_)) {
            return;
        }
        let notice = JsonRpcNotification::new(McpMethod::Cancelled.as_str())
            .with_params(json!({ "requestId": id, "reason": reason }));
        match tokio::time::timeout(CANCEL_NOTICE_TIMEOUT, self.write(&notice)).await {
            Ok(Ok(())) => debug!(server = %self.name, id, reason, "Sent cancellation notice"),
            Ok(Err(e)) => debug!(server = %self.name, id, error = %e, "Cancellation notice failed"),
            Err(_) => debug!(server = %self.name, id, "Cancellation notice timed out"),
        }
    }

    async fn degrade(&self, reason: String) {
        {
            let mut state = self.state.lock();
            if !matches!(*state, SessionState::Open) {
                return;
            }
            warn!(server = %self.name, reason = %reason, "Tool server session degraded");
            *state = SessionState::Degraded(reason);
        }
        if self.timeouts.abort_on_idle {
            info!(server = %self.name, "Aborting degraded tool server");
            if let Err(e) = self.transport.close().await {
                warn!(server = %self.name, error = %e, "Failed to close degraded transport");
            }
        }
    }

    fn ensure_usable(&self) -> Result<(), ToolServerError> {
        match &*self.state.lock() {
            SessionState::Open => Ok(()),
            SessionState::Degraded(reason) => Err(ToolServerError::SubprocessCrashed {
                server: self.name.clone(),
                exit_code: self.transport.exit_code(),
                detail: format!("session degraded: {reason}"),
            }),
            SessionState::Closed(detail) => Err(self.unavailable(detail)),
        }
    }

    fn unavailable(&self, detail: &str) -> ToolServerError {
        ToolServerError::SubprocessCrashed {
            server: self.name.clone(),
            exit_code: self.transport.exit_code(),
            detail: detail.to_string(),
        }
    }

    fn protocol_error(&self, message: String) -> ToolServerError {
        ToolServerError::Protocol {
            server: self.name.clone(),
            message,
        }
    }

    async fn write<T: Serialize + Sync>(&self, message: &T) -> Result<(), ToolServerError> {
        let frame =
            serde_json::to_vec(message).map_err(|e| self.protocol_error(e.to_string()))?;
        self.transport
            .send(&frame)
            .await
            .map_err(|e| ToolServerError::WriteFailed {
                server: self.name.clone(),
                message: e.to_string(),
            })
    }

    async fn read_loop(self: Arc<Self>) {
        loop {
            match self.transport.receive_next(None).await {
                Ok(frame) => {
                    *self.last_activity.lock() = Instant::now();
                    self.dispatch(&frame).await;
                }
                Err(TransportError::Timeout(_)) => continue,
                Err(e) => {
                    debug!(server = %self.name, error = %e, "Tool server stream ended");
                    break;
                }
            }
        }
        self.on_stream_closed();
    }

    fn on_stream_closed(&self) {
        let detail = {
            let mut state = self.state.lock();
            let detail = match &*state {
                SessionState::Closed(detail) => detail.clone(),
                _ => {
                    let tail = self.transport.stderr_tail();
                    if tail.is_empty() {
                        "stream closed".to_string()
                    } else {
                        format!("stream closed; stderr: {tail}")
                    }
                }
            };
            *state = SessionState::Closed(detail.clone());
            detail
        };

        let pending: Vec<_> = self.pending.lock().drain().collect();
        if !pending.is_empty() {
            warn!(
                server = %self.name,
                pending = pending.len(),
                exit_code = ?self.transport.exit_code(),
                "Tool server went away with requests in flight"
            );
        }
        for (_, responder) in pending {
            let _ = responder.send(Err(self.unavailable(&detail)));
        }
    }

    async fn dispatch(&self, frame: &[u8]) {
        let message = match Inbound::parse(frame) {
            Ok(message) => message,
            Err(e) => {
                let preview: String = String::from_utf8_lossy(frame).chars().take(200).collect();
                warn!(server = %self.name, error = %e, frame = %preview, "Discarding malformed frame");
                return;
            }
        };
        match message {
            Inbound::Response(response) => self.resolve(response),
            Inbound::Request(request) => self.answer(request).await,
            Inbound::Notification(notification) => self.publish(notification),
        }
    }

    fn resolve(&self, response: JsonRpcResponse) {
        let responder = response
            .id
            .as_number()
            .and_then(|id| self.pending.lock().remove(&id));
        let Some(responder) = responder else {
            warn!(server = %self.name, id = %response.id, "Discarding response with unknown id");
            return;
        };

        let outcome = match response.error {
            Some(error) => Err(ToolServerError::Rpc {
                server: self.name.clone(),
                code: error.code,
                message: error.message,
            }),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };
        // The caller may have given up already.
        let _ = responder.send(outcome);
    }

    async fn answer(&self, request: JsonRpcRequest) {
        let response = if request.method == McpMethod::Ping.as_str() {
            JsonRpcResponse::success(request.id, json!({}))
        } else {
            warn!(server = %self.name, method = %request.method, "Rejecting unsupported server request");
            JsonRpcResponse::error(request.id, JsonRpcError::method_not_found(&request.method))
        };
        if let Err(e) = self.write(&response).await {
            warn!(server = %self.name, error = %e, "Failed to answer server request");
        }
    }

    fn publish(&self, notification: JsonRpcNotification) {
        let event = ProgressEvent::notification(
            &self.name,
            &notification.method,
            notification.params.unwrap_or(Value::Null),
        );
        debug!(server = %self.name, method = %notification.method, "Notification");
        self.observer.read().on_event(&event);
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Removes a request from the pending map when its caller stops waiting.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<i64, Responder>>,
    id: i64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Sleep until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Map a `tools/call` result onto a [`ToolResult`].
fn tool_result_from(value: Value) -> ToolResult {
    let parsed: CallToolResult = match serde_json::from_value(value.clone()) {
        Ok(parsed) => parsed,
        Err(e) => {
            return ToolResult::failure(
                FailureReason::Protocol,
                format!("unreadable tools/call result: {e}"),
            )
            .with_structured_output(value);
        }
    };

    let text = parsed.text();
    let structured = parsed.structured_content.unwrap_or(value);
    if parsed.is_error {
        ToolResult::failure(FailureReason::ToolReported, "tool reported an error")
            .with_content(text)
            .with_structured_output(structured)
    } else {
        ToolResult::success(text).with_structured_output(structured)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
