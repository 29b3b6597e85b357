//! Multi-provider LLM client.
//!
//! Supports the **Anthropic Messages API** and the **OpenAI Chat Completions
//! API** (including OpenAI-compatible endpoints such as DeepSeek, OpenRouter,
//! Groq, Mistral and Ollama).  The agent loop speaks plain text with the model,
//! so only the non-streaming text path is implemented.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::llm::ChatProvider;
use crate::llm::types::{ChatMessage, Role};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default Anthropic API base URL.
pub(crate) const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Default OpenAI API base URL.
pub(crate) const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Upper bound for a single HTTP exchange; the loop may impose a tighter one.
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Provider enum
// ---------------------------------------------------------------------------

/// Identifies which wire protocol the client should speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI Chat Completions API (also covers OpenAI-compatible endpoints).
    OpenAI,
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a single LLM provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// Which protocol this configuration targets.
    pub provider: LlmProvider,
    /// Backend identifier reported in results (e.g. `"anthropic"`, `"groq"`).
    pub label: String,
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API (e.g. `https://api.anthropic.com`).
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Sampling temperature; `None` leaves the provider default.
    pub temperature: Option<f32>,
}

impl LlmClientConfig {
    /// Create a configuration for the Anthropic Claude API.
    pub fn anthropic(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            label: "anthropic".to_owned(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_owned(),
            model: model.into(),
            max_tokens: 4096,
            temperature: Some(0.0),
        }
    }

    /// Create a configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            label: "openai".to_owned(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_owned(),
            model: model.into(),
            max_tokens: 4096,
            temperature: Some(0.0),
        }
    }

    /// Create a configuration for any OpenAI-compatible API.
    pub fn openai_compatible(
        label: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            label: label.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: 4096,
            temperature: Some(0.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An LLM client that communicates with either the Anthropic Messages API or
/// the OpenAI Chat Completions API.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmClientConfig,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                env_var: format!("{}_API_KEY", config.label.to_uppercase()),
                provider: config.label,
            });
        }

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &LlmClientConfig {
        &self.config
    }

    /// Send the conversation and return the assistant's reply text.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let (url, headers, body) = match self.config.provider {
            LlmProvider::Anthropic => (
                format!("{}/v1/messages", self.config.base_url.trim_end_matches('/')),
                self.anthropic_headers()?,
                self.build_anthropic_request_body(messages),
            ),
            LlmProvider::OpenAI => (
                format!(
                    "{}/chat/completions",
                    self.config.base_url.trim_end_matches('/')
                ),
                self.openai_headers()?,
                self.build_openai_request_body(messages),
            ),
        };

        tracing::debug!(
            url = %url,
            model = %self.config.model,
            provider = %self.config.label,
            messages = messages.len(),
            "sending LLM request"
        );

        let resp = self.http.post(&url).headers(headers).json(&body).send().await?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AgentError::RateLimited {
                provider: self.config.label.clone(),
                reason: text,
            });
        }
        if !status.is_success() {
            return Err(AgentError::LlmRequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        match self.config.provider {
            LlmProvider::Anthropic => parse_anthropic_response(&v),
            LlmProvider::OpenAI => parse_openai_response(&v),
        }
    }

    // -- Anthropic -----------------------------------------------------------

    /// Build the JSON body for the Anthropic Messages API.
    fn build_anthropic_request_body(&self, messages: &[ChatMessage]) -> Value {
        let (system_text, messages) = messages_to_anthropic(messages);

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": messages,
        });

        if let Some(system) = system_text {
            body["system"] = json!(system);
        }
        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }

    fn anthropic_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| {
                AgentError::LlmRequestFailed {
                    reason: format!("invalid API key header: {e}"),
                }
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    // -- OpenAI --------------------------------------------------------------

    /// Build the JSON body for the OpenAI Chat Completions API.
    fn build_openai_request_body(&self, messages: &[ChatMessage]) -> Value {
        let wire: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": wire,
        });

        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }

    fn openai_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("invalid authorization header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl ChatProvider for LlmClient {
    async fn send_conversation(&self, messages: &[ChatMessage]) -> Result<String> {
        self.chat(messages).await
    }

    fn provider_name(&self) -> &str {
        &self.config.label
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// ===========================================================================
// Wire format conversion (free functions)
// ===========================================================================

/// Split the system turns out (Anthropic expects them as a top-level field,
/// not in the `messages` array) and merge consecutive turns of the same role,
/// which the Messages API rejects.
fn messages_to_anthropic(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
    let mut system: Option<String> = None;
    let mut turns: Vec<(Role, String)> = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::System => match &mut system {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(&msg.content);
                }
                None => system = Some(msg.content.clone()),
            },
            role => match turns.last_mut() {
                Some((last_role, text)) if *last_role == role => {
                    text.push_str("\n\n");
                    text.push_str(&msg.content);
                }
                _ => turns.push((role, msg.content.clone())),
            },
        }
    }

    let wire = turns
        .into_iter()
        .map(|(role, content)| json!({ "role": role.as_str(), "content": content }))
        .collect();

    (system, wire)
}

/// Parse a non-streaming Anthropic Messages API response into its text.
fn parse_anthropic_response(v: &Value) -> Result<String> {
    let content = v["content"]
        .as_array()
        .ok_or_else(|| AgentError::LlmParseFailed {
            reason: "missing `content` array in response".into(),
        })?;

    let text: String = content
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .collect();

    Ok(text)
}

/// Parse a non-streaming OpenAI Chat Completions API response into its text.
fn parse_openai_response(v: &Value) -> Result<String> {
    let message = &v["choices"][0]["message"];

    if message.is_null() {
        return Err(AgentError::LlmParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    Ok(message["content"].as_str().unwrap_or_default().to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn anthropic_client() -> LlmClient {
        LlmClient::new(LlmClientConfig::anthropic("test-key", "claude-sonnet-4-20250514")).unwrap()
    }

    #[test]
    fn build_anthropic_request_body_basic() {
        let client = anthropic_client();
        let messages = vec![
            ChatMessage::system("You are helpful."),
            ChatMessage::user("Hello"),
        ];

        let body = client.build_anthropic_request_body(&messages);

        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["system"], "You are helpful.");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["temperature"], 0.0);

        let wire = body["messages"].as_array().unwrap();
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["role"], "user");
        assert_eq!(wire[0]["content"], "Hello");
    }

    #[test]
    fn anthropic_merges_consecutive_same_role_turns() {
        let client = anthropic_client();
        let messages = vec![
            ChatMessage::system("rules"),
            ChatMessage::user("task"),
            ChatMessage::user("Observation: nothing parsed"),
            ChatMessage::assistant("Thought: retry"),
        ];

        let body = client.build_anthropic_request_body(&messages);
        let wire = body["messages"].as_array().unwrap();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0]["content"], "task\n\nObservation: nothing parsed");
        assert_eq!(wire[1]["role"], "assistant");
    }

    #[test]
    fn empty_api_key_returns_error() {
        let config = LlmClientConfig::anthropic("", "claude-sonnet-4-20250514");
        match LlmClient::new(config) {
            Err(AgentError::MissingApiKey { provider, env_var }) => {
                assert_eq!(provider, "anthropic");
                assert_eq!(env_var, "ANTHROPIC_API_KEY");
            }
            other => panic!("expected MissingApiKey, got {other:?}"),
        }
    }

    #[test]
    fn parse_anthropic_text_blocks_are_concatenated() {
        let response = json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Thought: draw it\n"},
                {"type": "text", "text": "Final Answer: done"}
            ],
            "stop_reason": "end_turn"
        });
        let text = parse_anthropic_response(&response).unwrap();
        assert_eq!(text, "Thought: draw it\nFinal Answer: done");
    }

    #[test]
    fn parse_anthropic_missing_content_is_error() {
        let err = parse_anthropic_response(&json!({"type": "error"})).unwrap_err();
        assert!(matches!(err, AgentError::LlmParseFailed { .. }));
    }

    #[test]
    fn build_openai_request_body_keeps_system_inline() {
        let client = LlmClient::new(LlmClientConfig::openai("sk-test", "gpt-4o")).unwrap();
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];

        let body = client.build_openai_request_body(&messages);
        let wire = body["messages"].as_array().unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[1]["content"], "hi");
    }

    #[test]
    fn parse_openai_text_response() {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": "Action: x"}}]
        });
        assert_eq!(parse_openai_response(&response).unwrap(), "Action: x");

        let err = parse_openai_response(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, AgentError::LlmParseFailed { .. }));
    }

    #[test]
    fn openai_compatible_config_construction() {
        let config = LlmClientConfig::openai_compatible(
            "groq",
            "gsk-test",
            "llama-3.3-70b-versatile",
            "https://api.groq.com/openai/v1",
        );
        assert_eq!(config.provider, LlmProvider::OpenAI);
        assert_eq!(config.label, "groq");

        let client = LlmClient::new(config).unwrap();
        assert_eq!(client.provider_name(), "groq");
        assert_eq!(client.model_name(), "llama-3.3-70b-versatile");
    }
}
