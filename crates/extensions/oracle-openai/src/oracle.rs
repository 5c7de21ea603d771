//! OpenAI decision oracle.

use async_trait::async_trait;
use tracing::debug;

use toolrelay_protocols::{Decision, DecisionOracle, OracleContext, OracleError};

use crate::api::{ApiErrorBody, ApiRequest, ApiResponse};
use crate::converter::{convert_context, convert_tools, parse_decision};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4.1";
const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert software developer. \
Use the available tools to complete the user's task, one tool call at a time. \
When the task is done, reply with a summary of what was created or changed.";

/// Chat-completions client that answers one decision per request.
pub struct OpenAiOracle {
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    system_prompt: String,
    client: reqwest::Client,
}

impl OpenAiOracle {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point at an OpenAI-compatible API; `/chat/completions` is appended.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request(&self, ctx: &OracleContext<'_>) -> ApiRequest {
        let tools = convert_tools(ctx.tools);
        let parallel_tool_calls = (!tools.is_empty()).then_some(false);
        ApiRequest {
            model: self.model.clone(),
            messages: convert_context(&self.system_prompt, ctx),
            temperature: self.temperature,
            tools,
            parallel_tool_calls,
        }
    }
}

#[async_trait]
impl DecisionOracle for OpenAiOracle {
    async fn decide(&self, ctx: &OracleContext<'_>) -> Result<Decision, OracleError> {
        let request = self.build_request(ctx);
        debug!(
            model = %self.model,
            turn = ctx.current_turn(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Requesting decision"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Request(format!("unreadable response: {e}")))?;
        let decision = parse_decision(body)?;
        debug!(turn = ctx.current_turn(), ?decision, "Oracle decided");
        Ok(decision)
    }
}

#[cfg(test)]
#[path = "oracle_tests.rs"]
mod tests;
