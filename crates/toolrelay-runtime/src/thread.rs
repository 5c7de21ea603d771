//! Resumable thread ids in tool output.

use serde_json::Value;

use toolrelay_protocols::{AgentTurn, ToolResult};

const THREAD_ID_KEYS: [&str; 4] = ["threadId", "thread_id", "conversationId", "sessionId"];
const MAX_DEPTH: usize = 4;

/// Thread id reported in a tool result, if any.
///
/// Structured output is searched first; content text is searched only when
/// it is itself a JSON document.
pub fn extract_thread_id(result: &ToolResult) -> Option<String> {
    result
        .structured_output
        .as_ref()
        .and_then(|value| find(value, 0))
        .or_else(|| {
            serde_json::from_str::<Value>(result.content.trim())
                .ok()
                .and_then(|value| find(&value, 0))
        })
}

/// Most recent thread id reported anywhere in the trace.
pub fn latest_thread_id(turns: &[AgentTurn]) -> Option<String> {
    turns
        .iter()
        .rev()
        .filter_map(|turn| turn.result.as_ref())
        .find_map(extract_thread_id)
}

fn find(value: &Value, depth: usize) -> Option<String> {
    let Value::Object(map) = value else {
        return None;
    };
    for key in THREAD_ID_KEYS {
        if let Some(Value::String(id)) = map.get(key) {
            if !id.is_empty() {
                return Some(id.clone());
            }
        }
    }
    if depth >= MAX_DEPTH {
        return None;
    }
    map.values().find_map(|nested| find(nested, depth + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};
    use toolrelay_protocols::{Decision, ToolCall};

    fn turn(number: u32, output: Option<Value>) -> AgentTurn {
        let mut result = ToolResult::success("ok");
        result.structured_output = output;
        AgentTurn {
            number,
            decision: Decision::tool_call(ToolCall::new("codex", Map::new())),
            result: Some(result),
        }
    }

    #[test]
    fn test_key_variants() {
        for key in THREAD_ID_KEYS {
            let result = ToolResult::success("").with_structured_output(json!({ key: "abc" }));
            assert_eq!(extract_thread_id(&result).as_deref(), Some("abc"), "{key}");
        }
    }

    #[test]
    fn test_nested_id() {
        let result = ToolResult::success("")
            .with_structured_output(json!({"meta": {"session": {"conversationId": "c-1"}}}));
        assert_eq!(extract_thread_id(&result).as_deref(), Some("c-1"));
    }

    #[test]
    fn test_ignores_non_string_and_empty() {
        let result = ToolResult::success("")
            .with_structured_output(json!({"threadId": 7, "sessionId": ""}));
        assert_eq!(extract_thread_id(&result), None);
        assert_eq!(extract_thread_id(&ToolResult::success("plain")), None);
    }

    #[test]
    fn test_json_content_is_searched_after_structured_output() {
        let from_text = ToolResult::success(r#"{"result": {"threadId": "t-text"}}"#);
        assert_eq!(extract_thread_id(&from_text).as_deref(), Some("t-text"));

        let both = ToolResult::success(r#"{"threadId": "t-text"}"#)
            .with_structured_output(json!({"threadId": "t-structured"}));
        assert_eq!(extract_thread_id(&both).as_deref(), Some("t-structured"));

        let prose = ToolResult::success("threadId is t-9, resume later");
        assert_eq!(extract_thread_id(&prose), None);
    }

    #[test]
    fn test_latest_wins() {
        let turns = vec![
            turn(1, Some(json!({"threadId": "old"}))),
            turn(2, Some(json!({"threadId": "new"}))),
            turn(3, None),
        ];
        assert_eq!(latest_thread_id(&turns).as_deref(), Some("new"));
        assert_eq!(latest_thread_id(&[]), None);
    }
}
