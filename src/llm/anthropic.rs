//! Anthropic client implementation
//!
//! Async HTTP client for the Messages API with tool calling support.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::core::{Config, CouncilError, Result, ToolCall, ToolDefinition};
use crate::llm::traits::{
    Completion, CompletionRequest, LLMProvider, ModelTier, PromptRole, TokenUsage,
};

const API_VERSION: &str = "2023-06-01";

/// Messages API client
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    primary_model: String,
    fast_model: String,
}

/// Messages API request
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a serde_json::Value,
}

/// Messages API response
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    model: String,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicClient {
    /// Create a new client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.llm.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.llm.base_url.trim_end_matches('/').to_string(),
            api_key,
            primary_model: config.models.primary.clone(),
            fast_model: config.models.fast.clone(),
        })
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Primary => &self.primary_model,
            ModelTier::Fast => &self.fast_model,
        }
    }

    /// Convert an API response to a completion
    fn to_completion(response: MessagesResponse) -> Completion {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ContentBlock::Text { text: chunk } => text.push_str(&chunk),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id: Some(id),
                    name,
                    arguments: input,
                }),
                ContentBlock::Other => {}
            }
        }

        Completion {
            text: text.trim().to_string(),
            tool_calls,
            truncated: response.stop_reason.as_deref() == Some("max_tokens"),
            model: response.model,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }),
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let model = self.model_for(request.tier);

        let body = MessagesRequest {
            model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: match m.role {
                        PromptRole::User => "user",
                        PromptRole::Assistant => "assistant",
                    },
                    content: &m.content,
                })
                .collect(),
            tools: request
                .tools
                .iter()
                .map(|t: &ToolDefinition| ApiTool {
                    name: &t.name,
                    description: &t.description,
                    input_schema: &t.input_schema,
                })
                .collect(),
        };

        debug!(
            model,
            max_tokens = request.max_tokens,
            tools = request.tools.len(),
            "requesting completion"
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    CouncilError::LlmUnreachable(self.base_url.clone())
                } else {
                    CouncilError::from(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CouncilError::llm(format!(
                "Messages API error ({}): {}",
                status, error_text
            )));
        }

        let response_text = response.text().await?;
        let parsed: MessagesResponse = serde_json::from_str(&response_text)
            .map_err(|e| CouncilError::llm(format!("Failed to parse response: {}", e)))?;

        Ok(Self::to_completion(parsed))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
