//! Console rendering of progress events.

use toolrelay_protocols::{ProgressEvent, ProgressObserver};

const PREVIEW_CHARS: usize = 160;

/// Prints progress to stderr, keeping stdout for the final answer.
pub(crate) struct ConsoleProgress;

impl ProgressObserver for ConsoleProgress {
    fn on_event(&self, event: &ProgressEvent) {
        if let Some(line) = render(event) {
            eprintln!("{line}");
        }
    }
}

fn render(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::Notification { server, params, .. } => {
            let kind = params
                .pointer("/msg/type")
                .and_then(|v| v.as_str())
                .unwrap_or("event");
            if kind.ends_with("_delta") {
                return None;
            }
            Some(format!("[{server}] {kind}"))
        }
        ProgressEvent::TurnStarted { .. } => None,
        ProgressEvent::ToolCallStarted { turn, call } => {
            Some(format!("turn {turn}: calling {}", call.name))
        }
        ProgressEvent::ToolCallFinished { turn, tool, result } => {
            let status = match result.failure_reason() {
                None => "ok".to_string(),
                Some(reason) => format!("failed ({reason})"),
            };
            let preview: String = result.to_context_text().chars().take(PREVIEW_CHARS).collect();
            Some(format!("turn {turn}: {tool} {status}: {}", preview.replace('\n', " ")))
        }
        ProgressEvent::Finished { turns } => Some(format!("finished after {turns} turns")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolrelay_protocols::{FailureReason, ToolResult};

    #[test]
    fn test_notification_shows_event_type() {
        let event = ProgressEvent::notification("codex", "codex/event", json!({"msg": {"type": "exec_command_begin"}}));
        assert_eq!(render(&event).unwrap(), "[codex] exec_command_begin");
    }

    #[test]
    fn test_deltas_are_skipped() {
        let event = ProgressEvent::notification("codex", "codex/event", json!({"msg": {"type": "agent_message_delta"}}));
        assert!(render(&event).is_none());
    }

    #[test]
    fn test_failed_call_summary() {
        let event = ProgressEvent::ToolCallFinished {
            turn: 2,
            tool: "codex".to_string(),
            result: ToolResult::failure(FailureReason::Timeout, "no reply"),
        };
        let line = render(&event).unwrap();
        assert!(line.starts_with("turn 2: codex failed (timeout)"));
    }
}
