//! File and environment configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `FIGAGENT_*` environment variables.  Command-line flags are applied last
//! by the binary.
//!
//! ```toml
//! [agent]
//! max_iterations = 8
//! provider_timeout_secs = 90
//! tool_timeout_secs = 30
//! temperature = 0.2
//! max_tokens = 2048
//! instructions = "Prefer left-to-right layouts."
//!
//! [provider]
//! name = "anthropic"
//! model = "claude-sonnet-4-20250514"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::llm::{LlmClientConfig, ProviderSettings};
use crate::runtime::AgentConfig;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "figagent.toml";

/// `[agent]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentSection {
    pub max_iterations: Option<u32>,
    pub provider_timeout_secs: Option<u64>,
    pub tool_timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub instructions: Option<String>,
}

/// `[provider]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSection {
    pub name: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Everything `figagent.toml` can hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FigagentConfig {
    pub agent: AgentSection,
    pub provider: ProviderSection,
}

impl FigagentConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| AgentError::Config {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Load `explicit` if given (it must exist), otherwise
    /// [`DEFAULT_CONFIG_FILE`] if present, otherwise defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Overlay `FIGAGENT_*` variables read through `lookup`.
    ///
    /// # Errors
    ///
    /// [`AgentError::Config`] when `FIGAGENT_MAX_ITERATIONS` is not a number.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(name) = get("FIGAGENT_PROVIDER") {
            self.provider.name = Some(name);
        }
        if let Some(model) = get("FIGAGENT_MODEL") {
            self.provider.model = Some(model);
        }
        if let Some(url) = get("FIGAGENT_API_BASE_URL") {
            self.provider.base_url = Some(url);
        }
        if let Some(raw) = get("FIGAGENT_MAX_ITERATIONS") {
            let parsed = raw.trim().parse::<u32>().map_err(|_| AgentError::Config {
                reason: format!("FIGAGENT_MAX_ITERATIONS must be a positive integer, got {raw:?}"),
            })?;
            self.agent.max_iterations = Some(parsed);
        }
        Ok(())
    }

    /// Loop settings with defaults filled in.
    pub fn agent_config(&self) -> AgentConfig {
        let mut config = AgentConfig::default();
        if let Some(n) = self.agent.max_iterations {
            config.max_iterations = n;
        }
        if let Some(secs) = self.agent.provider_timeout_secs {
            config.provider_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.agent.tool_timeout_secs {
            config.tool_timeout = Duration::from_secs(secs);
        }
        config.instructions = self.agent.instructions.clone();
        config
    }

    /// Provider resolution input, with credentials supplied by the caller.
    pub fn provider_settings(&self, credentials: HashMap<String, String>) -> ProviderSettings {
        ProviderSettings {
            explicit_provider: self.provider.name.clone(),
            model_override: self.provider.model.clone(),
            base_url_override: self.provider.base_url.clone(),
            credentials,
        }
    }

    /// Apply sampling settings to a resolved client configuration.
    pub fn tune_client(&self, client: &mut LlmClientConfig) {
        if let Some(temperature) = self.agent.temperature {
            client.temperature = Some(temperature);
        }
        if let Some(max_tokens) = self.agent.max_tokens {
            client.max_tokens = max_tokens;
        }
    }
}
