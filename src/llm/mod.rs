//! LLM module - language-model service integration
//!
//! Provides the provider abstraction and the Anthropic Messages API client.

pub mod anthropic;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use traits::{
    Completion, CompletionRequest, LLMProvider, ModelTier, PromptMessage, PromptRole, TokenUsage,
};
