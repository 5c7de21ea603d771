//! Conversion between the oracle context and chat-completions messages.

use serde_json::{Map, Value};

use toolrelay_protocols::{Decision, OracleContext, OracleError, ToolCall, ToolDescriptor};

use crate::api::{ApiMessage, ApiResponse, ApiTool, ApiToolCall, FunctionCall, FunctionDef};

/// Messages for one decision: system prompt, goal, then the trace.
pub fn convert_context(system_prompt: &str, ctx: &OracleContext<'_>) -> Vec<ApiMessage> {
    let mut system = system_prompt.to_string();
    if let Some(extra) = ctx.instructions {
        system.push_str("\n\n");
        system.push_str(extra);
    }

    let mut messages = vec![
        ApiMessage::text("system", system),
        ApiMessage::text("user", ctx.goal),
    ];
    for turn in ctx.turns {
        match &turn.decision {
            Decision::FinalAnswer { text } => messages.push(ApiMessage::text("assistant", text.as_str())),
            Decision::ToolCall { call } => {
                messages.push(ApiMessage {
                    role: "assistant".to_string(),
                    content: None,
                    tool_calls: Some(vec![ApiToolCall {
                        id: call.id.clone(),
                        call_type: "function".to_string(),
                        function: FunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments_value().to_string(),
                        },
                    }]),
                    tool_call_id: None,
                });
                let output = turn
                    .result
                    .as_ref()
                    .map(|r| r.to_context_text())
                    .unwrap_or_default();
                messages.push(ApiMessage {
                    role: "tool".to_string(),
                    content: Some(output),
                    tool_calls: None,
                    tool_call_id: Some(call.id.clone()),
                });
            }
        }
    }
    messages
}

/// Function tools for every discovered descriptor.
pub fn convert_tools(tools: &[ToolDescriptor]) -> Vec<ApiTool> {
    tools
        .iter()
        .map(|tool| ApiTool {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.json_schema(),
            },
        })
        .collect()
}

/// Turn the model's reply into a decision.
pub fn parse_decision(response: ApiResponse) -> Result<Decision, OracleError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| OracleError::MalformedDecision("response has no choices".to_string()))?;

    if let Some(call) = choice.message.tool_calls.into_iter().next() {
        let arguments = parse_arguments(&call.function)?;
        let call = ToolCall::new(call.function.name, arguments).with_id(call.id);
        return Ok(Decision::tool_call(call));
    }

    match choice.message.content {
        Some(text) => Ok(Decision::final_answer(text)),
        None => Err(OracleError::MalformedDecision(format!(
            "reply has neither content nor tool calls (finish_reason: {})",
            choice.finish_reason.as_deref().unwrap_or("none")
        ))),
    }
}

fn parse_arguments(function: &FunctionCall) -> Result<Map<String, Value>, OracleError> {
    if function.arguments.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(&function.arguments) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(OracleError::MalformedDecision(format!(
            "arguments for '{}' are not an object: {other}",
            function.name
        ))),
        Err(e) => Err(OracleError::MalformedDecision(format!(
            "arguments for '{}' are not valid JSON: {e}",
            function.name
        ))),
    }
}

#[cfg(test)]
#[path = "converter_tests.rs"]
mod tests;
