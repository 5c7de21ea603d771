//! Progress events and observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::tool::{ToolCall, ToolResult};

/// Something that happened during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A notification sent by a tool server outside the request/response cycle.
    Notification {
        server: String,
        method: String,
        params: serde_json::Value,
        received_at: DateTime<Utc>,
    },
    /// The agent loop started deciding turn `turn`.
    TurnStarted { turn: u32 },
    /// A validated tool call was dispatched.
    ToolCallStarted { turn: u32, call: ToolCall },
    /// A tool call resolved (successfully or not).
    ToolCallFinished {
        turn: u32,
        tool: String,
        result: ToolResult,
    },
    /// The oracle produced its final answer.
    Finished { turns: u32 },
}

impl ProgressEvent {
    /// Build a notification event stamped with the current time.
    pub fn notification(
        server: impl Into<String>,
        method: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        ProgressEvent::Notification {
            server: server.into(),
            method: method.into(),
            params,
            received_at: Utc::now(),
        }
    }
}

/// Receives progress events as they are produced.
///
/// Called inline from the producing task, so implementations must not block.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Forward events into a channel.
impl ProgressObserver for mpsc::UnboundedSender<ProgressEvent> {
    fn on_event(&self, event: &ProgressEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.send(event.clone());
    }
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_event(&self, _event: &ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_constructor() {
        let event = ProgressEvent::notification("codex", "codex/event", serde_json::json!({"msg": 1}));
        match event {
            ProgressEvent::Notification { server, method, .. } => {
                assert_eq!(server, "codex");
                assert_eq!(method, "codex/event");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_channel_observer_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.on_event(&ProgressEvent::TurnStarted { turn: 1 });
        assert!(matches!(rx.try_recv(), Ok(ProgressEvent::TurnStarted { turn: 1 })));
    }

    #[test]
    fn test_channel_observer_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.on_event(&ProgressEvent::Finished { turns: 2 });
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_string(&ProgressEvent::Finished { turns: 3 }).unwrap();
        assert!(json.contains("\"type\":\"finished\""));
    }
}
