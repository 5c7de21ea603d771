//! Subprocess transport for stdio tool servers.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toolrelay_config::ServerLaunch;

use crate::codec::LineFrameCodec;

const STDERR_TAIL_LINES: usize = 40;
const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Framed byte channel to one tool server.
///
/// `send` and `receive_next` may be called concurrently from different
/// tasks; only one task should be receiving at a time.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name of the server on the other end.
    fn server_name(&self) -> &str;

    /// Write one frame, terminated by the delimiter, and flush.
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Next complete frame, waiting at most `timeout` when given.
    async fn receive_next(&self, timeout: Option<Duration>) -> Result<Bytes, TransportError>;

    /// Tear the channel down. Calling it again is a no-op.
    async fn close(&self) -> Result<(), TransportError>;

    /// Exit status of the server process, once known.
    fn exit_code(&self) -> Option<i32> {
        None
    }

    /// Last lines the server wrote to its diagnostic stream.
    fn stderr_tail(&self) -> String {
        String::new()
    }
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("No frame within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Stream closed")]
    StreamClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A tool server running as a child process, framed over its stdio.
pub struct ProcessTransport {
    name: String,
    pid: Option<u32>,
    child: tokio::sync::Mutex<Option<Child>>,
    stdin: tokio::sync::Mutex<Option<FramedWrite<ChildStdin, LineFrameCodec>>>,
    stdout: tokio::sync::Mutex<FramedRead<ChildStdout, LineFrameCodec>>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    exit_code: Mutex<Option<i32>>,
    cancel: CancellationToken,
    closed: AtomicBool,
    close_grace: Duration,
}

impl ProcessTransport {
    /// Spawn the server described by `launch`.
    ///
    /// The child starts from an empty environment and receives exactly the
    /// overlay carried by the launch description.
    pub async fn start(launch: &ServerLaunch) -> Result<Self, TransportError> {
        let mut command = Command::new(&launch.command);
        command
            .args(&launch.args)
            .current_dir(&launch.cwd)
            .env_clear()
            .envs(launch.env.iter())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|source| TransportError::SpawnFailed {
                command: launch.display_command(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::WriteFailed("failed to capture stdin".to_string()))?;
        let stdout = child.stdout.take().ok_or(TransportError::StreamClosed)?;
        let stderr = child.stderr.take();
        let pid = child.id();

        info!(
            server = %launch.name,
            command = %launch.display_command(),
            cwd = %launch.cwd.display(),
            pid = ?pid,
            "Spawned tool server"
        );

        let cancel = CancellationToken::new();
        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        if let Some(stderr) = stderr {
            tokio::spawn(drain_stderr(
                launch.name.clone(),
                stderr,
                Arc::clone(&stderr_tail),
                cancel.clone(),
            ));
        }

        Ok(Self {
            name: launch.name.clone(),
            pid,
            child: tokio::sync::Mutex::new(Some(child)),
            stdin: tokio::sync::Mutex::new(Some(FramedWrite::new(stdin, LineFrameCodec::new()))),
            stdout: tokio::sync::Mutex::new(FramedRead::new(stdout, LineFrameCodec::new())),
            stderr_tail,
            exit_code: Mutex::new(None),
            cancel,
            closed: AtomicBool::new(false),
            close_grace: DEFAULT_CLOSE_GRACE,
        })
    }

    /// How long `close` waits for the child to exit after killing it.
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait briefly for a child whose stdout has ended and record its status.
    async fn reap(&self) {
        let mut guard = self.child.lock().await;
        let Some(child) = guard.as_mut() else {
            return;
        };
        match tokio::time::timeout(self.close_grace, child.wait()).await {
            Ok(Ok(status)) => {
                *self.exit_code.lock() = status.code();
                debug!(server = %self.name, ?status, "Tool server exited");
                guard.take();
            }
            Ok(Err(e)) => warn!(server = %self.name, error = %e, "Failed to wait for tool server"),
            Err(_) => debug!(server = %self.name, "Tool server closed stdout but is still running"),
        }
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    fn server_name(&self) -> &str {
        &self.name
    }

    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let closed = || TransportError::WriteFailed("transport is closed".to_string());
        let mut guard = tokio::select! {
            _ = self.cancel.cancelled() => return Err(closed()),
            guard = self.stdin.lock() => guard,
        };
        let sink = guard.as_mut().ok_or_else(closed)?;
        // A child that stops reading fills the pipe; close must still get through.
        tokio::select! {
            _ = self.cancel.cancelled() => Err(closed()),
            sent = sink.send(Bytes::copy_from_slice(frame)) => {
                sent.map_err(|e| TransportError::WriteFailed(e.to_string()))
            }
        }
    }

    async fn receive_next(&self, timeout: Option<Duration>) -> Result<Bytes, TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::StreamClosed);
        }
        let mut frames = self.stdout.lock().await;
        let next = async {
            tokio::select! {
                _ = self.cancel.cancelled() => None,
                frame = frames.next() => Some(frame),
            }
        };
        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, next)
                .await
                .map_err(|_| TransportError::Timeout(limit))?,
            None => next.await,
        };
        match outcome {
            Some(Some(Ok(frame))) => Ok(frame),
            Some(Some(Err(e))) => {
                warn!(server = %self.name, error = %e, "Read from tool server failed");
                drop(frames);
                self.reap().await;
                Err(TransportError::Io(e))
            }
            Some(None) => {
                drop(frames);
                self.reap().await;
                Err(TransportError::StreamClosed)
            }
            None => Err(TransportError::StreamClosed),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cancel.cancel();
        self.stdin.lock().await.take();

        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            if matches!(child.try_wait(), Ok(None)) {
                if let Err(e) = child.start_kill() {
                    warn!(server = %self.name, error = %e, "Failed to kill tool server");
                }
            }
            match tokio::time::timeout(self.close_grace, child.wait()).await {
                Ok(Ok(status)) => {
                    *self.exit_code.lock() = status.code();
                    debug!(server = %self.name, ?status, "Tool server stopped");
                }
                Ok(Err(e)) => warn!(server = %self.name, error = %e, "Failed to reap tool server"),
                Err(_) => warn!(
                    server = %self.name,
                    grace_ms = self.close_grace.as_millis() as u64,
                    "Tool server did not exit within the grace period"
                ),
            }
        }
        info!(server = %self.name, exit_code = ?self.exit_code(), "Closed tool server transport");
        Ok(())
    }

    fn exit_code(&self) -> Option<i32> {
        *self.exit_code.lock()
    }

    fn stderr_tail(&self) -> String {
        self.stderr_tail
            .lock()
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

async fn drain_stderr(
    server: String,
    stderr: ChildStderr,
    tail: Arc<Mutex<VecDeque<String>>>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => {
                debug!(target: "toolrelay::server_stderr", server = %server, "{line}");
                let mut tail = tail.lock();
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Ok(None) => break,
            Err(e) => {
                debug!(server = %server, error = %e, "Stopped reading tool server stderr");
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
