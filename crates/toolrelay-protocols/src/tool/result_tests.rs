use super::*;

#[test]
fn test_tool_result_success() {
    let result = ToolResult::success("OK");
    assert!(result.success);
    assert_eq!(result.content, "OK");
    assert!(result.error.is_none());
    assert!(result.structured_output.is_none());
    assert!(result.failure_reason().is_none());
}

#[test]
fn test_tool_result_success_json() {
    let output = serde_json::json!({"threadId": "t-1"});
    let result = ToolResult::success_json("OK", output);
    assert!(result.success);
    assert_eq!(result.structured_output.as_ref().unwrap()["threadId"], "t-1");
}

#[test]
fn test_tool_result_failure() {
    let result = ToolResult::failure(FailureReason::UnknownTool, "no tool named ghost");
    assert!(!result.success);
    assert!(result.content.is_empty());
    assert_eq!(result.failure_reason(), Some(FailureReason::UnknownTool));
    assert_eq!(result.error.unwrap().message, "no tool named ghost");
}

#[test]
fn test_context_text_for_failure() {
    let result = ToolResult::failure(FailureReason::Timeout, "no response after 5s");
    assert_eq!(result.to_context_text(), "Error (timeout): no response after 5s");

    let result = ToolResult::failure(FailureReason::ToolReported, "exit 1")
        .with_content("permission denied");
    assert_eq!(
        result.to_context_text(),
        "Error (tool_reported): exit 1\npermission denied"
    );
}

#[test]
fn test_context_text_for_success() {
    assert_eq!(ToolResult::success("done").to_context_text(), "done");
}

#[test]
fn test_tool_result_with_metadata() {
    let result = ToolResult::success("OK").with_metadata("duration_ms", serde_json::json!(100));
    assert_eq!(result.metadata["duration_ms"], serde_json::json!(100));
}

#[test]
fn test_failure_reason_serialization() {
    let json = serde_json::to_string(&FailureReason::InvalidArguments).unwrap();
    assert_eq!(json, "\"invalid_arguments\"");
    assert_eq!(FailureReason::Rpc.to_string(), "rpc");
}

#[test]
fn test_tool_result_serialization_skips_empty_fields() {
    let json = serde_json::to_string(&ToolResult::success("OK")).unwrap();
    assert!(json.contains("OK"));
    assert!(!json.contains("structured_output"));
    assert!(!json.contains("\"error\""));
}
