//! LLM integration layer (the provider gateway).
//!
//! This module provides the interface between the agent loop and large
//! language model providers.  It is organized into:
//!
//! - [`types`] -- Conversation types (roles, chat messages).
//! - [`client`] -- HTTP client for Anthropic and OpenAI-compatible APIs.
//! - [`detect`] -- Backend resolution from explicit settings or credentials.

pub mod client;
pub mod detect;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

// Re-export the most commonly used types for convenience.
pub use client::{LlmClient, LlmClientConfig, LlmProvider};
pub use detect::{ProviderSettings, detect_provider, env_non_empty};
pub use types::{ChatMessage, Role};

/// Conversation in, assistant text out.
///
/// The agent loop only ever talks to a model through this trait, so tests can
/// script responses and callers can wrap real clients (retries, caching,
/// context-window policies) without the loop noticing.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send the full ordered conversation and return the next assistant turn.
    async fn send_conversation(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Backend identifier for logging and results (e.g. `"anthropic"`).
    fn provider_name(&self) -> &str;

    /// Model identifier being used.
    fn model_name(&self) -> &str {
        ""
    }
}
