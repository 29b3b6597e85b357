//! Provider resolution.
//!
//! Decides which backend answers the agent's conversation.  The inputs are
//! captured once into a [`ProviderSettings`] value and passed explicitly, so
//! concurrent runs can use different backends without touching the process
//! environment.
//!
//! Resolution order:
//!
//! 1. An explicit provider selection (config file, `--provider`, or
//!    `FIGAGENT_PROVIDER`) wins and fails if its credential is missing.
//! 2. Otherwise the first credential found in the order Anthropic, OpenAI,
//!    DeepSeek, Google, OpenRouter, Groq, Mistral is used.
//! 3. Nothing found is an error; Ollama is only used when asked for.

use std::collections::HashMap;

use crate::error::{AgentError, Result};
use crate::llm::client::LlmClientConfig;

const DEFAULT_MODEL_ANTHROPIC: &str = "claude-sonnet-4-20250514";
const DEFAULT_MODEL_OPENAI: &str = "gpt-4o";
const DEFAULT_MODEL_DEEPSEEK: &str = "deepseek-chat";
const DEFAULT_MODEL_GOOGLE: &str = "gemini-2.5-flash";
const DEFAULT_MODEL_OPENROUTER: &str = "anthropic/claude-sonnet-4";
const DEFAULT_MODEL_GROQ: &str = "llama-3.3-70b-versatile";
const DEFAULT_MODEL_MISTRAL: &str = "mistral-large-latest";
const DEFAULT_MODEL_OLLAMA: &str = "qwen2.5:latest";

const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Environment variables consulted by [`ProviderSettings::from_env`].
const CREDENTIAL_VARS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "DEEPSEEK_API_KEY",
    "GOOGLE_API_KEY",
    "OPENROUTER_API_KEY",
    "GROQ_API_KEY",
    "MISTRAL_API_KEY",
];

/// A backend the resolver knows how to configure.
#[derive(Debug, Clone, Copy)]
struct Backend {
    name: &'static str,
    env_var: &'static str,
    default_model: &'static str,
    /// `None` for the two native protocols, which carry their own defaults.
    base_url: Option<&'static str>,
}

/// Auto-detection order.
const BACKENDS: &[Backend] = &[
    Backend {
        name: "anthropic",
        env_var: "ANTHROPIC_API_KEY",
        default_model: DEFAULT_MODEL_ANTHROPIC,
        base_url: None,
    },
    Backend {
        name: "openai",
        env_var: "OPENAI_API_KEY",
        default_model: DEFAULT_MODEL_OPENAI,
        base_url: None,
    },
    Backend {
        name: "deepseek",
        env_var: "DEEPSEEK_API_KEY",
        default_model: DEFAULT_MODEL_DEEPSEEK,
        base_url: Some(DEEPSEEK_BASE_URL),
    },
    Backend {
        name: "google",
        env_var: "GOOGLE_API_KEY",
        default_model: DEFAULT_MODEL_GOOGLE,
        base_url: Some(GOOGLE_BASE_URL),
    },
    Backend {
        name: "openrouter",
        env_var: "OPENROUTER_API_KEY",
        default_model: DEFAULT_MODEL_OPENROUTER,
        base_url: Some(OPENROUTER_BASE_URL),
    },
    Backend {
        name: "groq",
        env_var: "GROQ_API_KEY",
        default_model: DEFAULT_MODEL_GROQ,
        base_url: Some(GROQ_BASE_URL),
    },
    Backend {
        name: "mistral",
        env_var: "MISTRAL_API_KEY",
        default_model: DEFAULT_MODEL_MISTRAL,
        base_url: Some(MISTRAL_BASE_URL),
    },
];

/// Everything provider resolution needs, captured as a plain value.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    /// Explicit backend name or alias (e.g. `"claude"`, `"groq"`, `"ollama"`).
    pub explicit_provider: Option<String>,
    /// Model to use instead of the backend default.
    pub model_override: Option<String>,
    /// Base URL to use instead of the backend default.
    pub base_url_override: Option<String>,
    /// Credentials keyed by environment variable name.
    pub credentials: HashMap<String, String>,
}

impl ProviderSettings {
    /// Capture provider settings from the process environment.
    ///
    /// Empty variables are treated as unset.
    pub fn from_env() -> Self {
        let credentials = CREDENTIAL_VARS
            .iter()
            .filter_map(|name| env_non_empty(name).map(|v| ((*name).to_owned(), v)))
            .collect();

        Self {
            explicit_provider: env_non_empty("FIGAGENT_PROVIDER"),
            model_override: env_non_empty("FIGAGENT_MODEL"),
            base_url_override: env_non_empty("FIGAGENT_API_BASE_URL"),
            credentials,
        }
    }

    /// Add or replace a credential.
    pub fn with_credential(mut self, env_var: impl Into<String>, key: impl Into<String>) -> Self {
        self.credentials.insert(env_var.into(), key.into());
        self
    }

    fn credential(&self, env_var: &str) -> Option<&str> {
        self.credentials
            .get(env_var)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn build(&self, backend: &Backend, key: &str) -> LlmClientConfig {
        let model = self
            .model_override
            .clone()
            .unwrap_or_else(|| backend.default_model.to_owned());

        let mut cfg = match backend.name {
            "anthropic" => LlmClientConfig::anthropic(key, model),
            "openai" => LlmClientConfig::openai(key, model),
            name => LlmClientConfig::openai_compatible(
                name,
                key,
                model,
                backend.base_url.unwrap_or_default(),
            ),
        };
        if let Some(url) = &self.base_url_override {
            cfg.base_url = url.clone();
        }
        cfg
    }
}

/// Resolve which backend implementation to use from the given settings.
///
/// # Errors
///
/// - [`AgentError::MissingApiKey`] when an explicitly selected backend has no
///   credential.
/// - [`AgentError::Config`] for an unknown explicit provider without a base
///   URL override.
/// - [`AgentError::NoProviderConfigured`] when auto-detection finds nothing.
pub fn detect_provider(settings: &ProviderSettings) -> Result<LlmClientConfig> {
    if let Some(explicit) = &settings.explicit_provider {
        return resolve_explicit(settings, &explicit.to_lowercase());
    }

    for backend in BACKENDS {
        if let Some(key) = settings.credential(backend.env_var) {
            tracing::info!(provider = backend.name, "auto-detected LLM provider");
            return Ok(settings.build(backend, key));
        }
    }

    Err(AgentError::NoProviderConfigured {
        hint: format!(
            "set one of {} or select a provider explicitly",
            CREDENTIAL_VARS.join(", ")
        ),
    })
}

fn resolve_explicit(settings: &ProviderSettings, name: &str) -> Result<LlmClientConfig> {
    let canonical = match name {
        "claude" => "anthropic",
        "gpt" => "openai",
        "gemini" => "google",
        "local" => "ollama",
        other => other,
    };

    if canonical == "ollama" {
        let model = settings
            .model_override
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL_OLLAMA.to_owned());
        let base = settings
            .base_url_override
            .clone()
            .unwrap_or_else(|| OLLAMA_BASE_URL.to_owned());
        return Ok(LlmClientConfig::openai_compatible(
            "ollama", "ollama", model, base,
        ));
    }

    if let Some(backend) = BACKENDS.iter().find(|b| b.name == canonical) {
        let key = settings
            .credential(backend.env_var)
            .ok_or_else(|| AgentError::MissingApiKey {
                provider: backend.name.to_owned(),
                env_var: backend.env_var.to_owned(),
            })?;
        tracing::info!(provider = backend.name, "using explicitly selected LLM provider");
        return Ok(settings.build(backend, key));
    }

    // Any other name is an OpenAI-compatible host the caller points us at.
    let base = settings
        .base_url_override
        .clone()
        .ok_or_else(|| AgentError::Config {
            reason: format!("provider '{canonical}' requires an explicit API base URL"),
        })?;
    let key = settings
        .credential("OPENAI_API_KEY")
        .unwrap_or("no-key")
        .to_owned();
    let model = settings
        .model_override
        .clone()
        .unwrap_or_else(|| canonical.to_owned());
    Ok(LlmClientConfig::openai_compatible(canonical, key, model, base))
}

/// Read a non-empty environment variable, returning `None` if unset or empty.
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::LlmProvider;

    #[test]
    fn nothing_configured_is_an_error() {
        let err = detect_provider(&ProviderSettings::default()).unwrap_err();
        assert!(matches!(err, AgentError::NoProviderConfigured { .. }));
    }

    #[test]
    fn auto_detect_prefers_anthropic() {
        let settings = ProviderSettings::default()
            .with_credential("GROQ_API_KEY", "gsk")
            .with_credential("ANTHROPIC_API_KEY", "sk-ant");
        let cfg = detect_provider(&settings).unwrap();
        assert_eq!(cfg.provider, LlmProvider::Anthropic);
        assert_eq!(cfg.label, "anthropic");
        assert_eq!(cfg.model, DEFAULT_MODEL_ANTHROPIC);
    }

    #[test]
    fn auto_detect_falls_through_to_compatible_hosts() {
        let settings = ProviderSettings::default().with_credential("GROQ_API_KEY", "gsk");
        let cfg = detect_provider(&settings).unwrap();
        assert_eq!(cfg.provider, LlmProvider::OpenAI);
        assert_eq!(cfg.label, "groq");
        assert_eq!(cfg.base_url, GROQ_BASE_URL);
    }

    #[test]
    fn empty_credentials_are_ignored() {
        let settings = ProviderSettings::default()
            .with_credential("ANTHROPIC_API_KEY", "")
            .with_credential("OPENAI_API_KEY", "sk-openai");
        assert_eq!(detect_provider(&settings).unwrap().label, "openai");
    }

    #[test]
    fn explicit_alias_without_key_fails() {
        let settings = ProviderSettings {
            explicit_provider: Some("Claude".into()),
            ..ProviderSettings::default()
        }
        .with_credential("OPENAI_API_KEY", "sk-openai");
        match detect_provider(&settings).unwrap_err() {
            AgentError::MissingApiKey { provider, env_var } => {
                assert_eq!(provider, "anthropic");
                assert_eq!(env_var, "ANTHROPIC_API_KEY");
            }
            other => panic!("expected MissingApiKey, got {other:?}"),
        }
    }

    #[test]
    fn overrides_apply_to_detected_backend() {
        let settings = ProviderSettings {
            model_override: Some("gpt-4.1-mini".into()),
            base_url_override: Some("http://proxy.local/v1".into()),
            ..ProviderSettings::default()
        }
        .with_credential("OPENAI_API_KEY", "sk-openai");
        let cfg = detect_provider(&settings).unwrap();
        assert_eq!(cfg.model, "gpt-4.1-mini");
        assert_eq!(cfg.base_url, "http://proxy.local/v1");
    }

    #[test]
    fn ollama_only_when_explicit() {
        let settings = ProviderSettings {
            explicit_provider: Some("local".into()),
            ..ProviderSettings::default()
        };
        let cfg = detect_provider(&settings).unwrap();
        assert_eq!(cfg.label, "ollama");
        assert_eq!(cfg.base_url, OLLAMA_BASE_URL);
    }

    #[test]
    fn unknown_explicit_provider_needs_base_url() {
        let mut settings = ProviderSettings {
            explicit_provider: Some("vllm".into()),
            ..ProviderSettings::default()
        };
        assert!(matches!(
            detect_provider(&settings).unwrap_err(),
            AgentError::Config { .. }
        ));

        settings.base_url_override = Some("http://gpu-box:8000/v1".into());
        let cfg = detect_provider(&settings).unwrap();
        assert_eq!(cfg.label, "vllm");
        assert_eq!(cfg.model, "vllm");
        assert_eq!(cfg.api_key, "no-key");
    }
}
