//! LLM Provider trait for abstracting the language-model service
//!
//! The engine treats the service as a black box that turns a persona, a
//! prompt, and optional tool descriptors into text and tool-call requests.

use async_trait::async_trait;

use crate::core::{Result, ToolCall, ToolDefinition};

/// Which latency/capability tier a request should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Higher-capability tier for primary drafting
    Primary,
    /// Low-latency tier for relevance classification and interjections
    Fast,
}

/// Speaker of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    User,
    Assistant,
}

/// One message sent to the provider
#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub tier: ModelTier,
    /// Persona / system prompt
    pub system: Option<String>,
    pub messages: Vec<PromptMessage>,
    /// Output ceiling in tokens
    pub max_tokens: u32,
    /// Tools the model may request; empty disables tool use
    pub tools: Vec<ToolDefinition>,
}

impl CompletionRequest {
    /// A single-prompt request without tools
    pub fn simple(tier: ModelTier, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            tier,
            system: None,
            messages: vec![PromptMessage::user(prompt)],
            max_tokens,
            tools: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Token usage information
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Response from an LLM provider
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Text content of the response
    pub text: String,
    /// Any tool calls the model wants to make
    pub tool_calls: Vec<ToolCall>,
    /// Generation stopped at the output ceiling
    pub truncated: bool,
    /// Model that generated the response
    pub model: String,
    /// Token usage information
    pub usage: Option<TokenUsage>,
}

impl Completion {
    /// Plain text completion, mainly for tests and fakes
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;

    /// Get the provider name
    fn name(&self) -> &str;
}
