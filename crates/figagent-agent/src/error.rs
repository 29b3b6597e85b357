//! Agent error types.
//!
//! All agent subsystems surface errors through [`AgentError`].  Each variant
//! carries enough context for callers to decide how to handle the failure.
//! The coarse [`ErrorKind`] classification drives the loop's recovery policy:
//! parse, unknown-tool and tool-execution errors are fed back to the model,
//! everything else ends the run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::parser::ParseError;

/// Unified error type for the agent runtime.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Provider errors -----------------------------------------------------
    /// An HTTP request to the LLM provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The provider answered, but the body did not have the expected shape.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The provider rejected the request because of rate limiting.
    #[error("rate limited by {provider}: {reason}")]
    RateLimited { provider: String, reason: String },

    /// A provider call did not complete within the configured timeout.
    #[error("provider call timed out after {after_secs}s")]
    ProviderTimeout { after_secs: u64 },

    /// No backend could be resolved from the supplied settings.
    #[error("no LLM provider configured: {hint}")]
    NoProviderConfigured { hint: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider} (set {env_var})")]
    MissingApiKey { provider: String, env_var: String },

    // -- Runtime errors ------------------------------------------------------
    /// The loop used its whole iteration budget without a final answer.
    #[error("run {run_id} exhausted its budget of {max_iterations} iterations")]
    BudgetExhausted { run_id: Uuid, max_iterations: u32 },

    /// The run observed an external cancellation signal.
    #[error("run {run_id} was cancelled")]
    Cancelled { run_id: Uuid },

    /// The model's output did not follow the ReAct format.
    #[error("unparseable model output: {0}")]
    Parse(#[from] ParseError),

    /// An action names a tool that is not present in the registry.
    #[error("unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    /// A registered tool's execute operation failed.
    #[error("tool execution failed for `{tool_name}`: {reason}")]
    ToolExecutionFailed { tool_name: String, reason: String },

    /// A tool with the same name is already registered.
    #[error("tool already registered: {tool_name}")]
    DuplicateTool { tool_name: String },

    /// Tool names must be non-empty and free of whitespace.
    #[error("invalid tool name: {tool_name:?}")]
    InvalidToolName { tool_name: String },

    // -- Configuration errors ------------------------------------------------
    /// Configuration validation or loading failed.
    #[error("config error: {reason}")]
    Config { reason: String },

    /// A TOML configuration file could not be parsed.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}

/// The error taxonomy the agent loop reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Model output not in a recognizable format.
    Parse,
    /// Action names a tool absent from the registry.
    UnknownTool,
    /// A registered tool failed.
    ToolExecution,
    /// The model backend failed.
    Provider,
    /// The iteration cap was reached without a final answer.
    BudgetExhausted,
    /// External cancellation was observed.
    Cancelled,
    /// Setup problems: configuration and tool registration.
    Setup,
}

impl ErrorKind {
    /// Whether the loop converts this kind into an observation instead of
    /// ending the run.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::Parse | Self::UnknownTool | Self::ToolExecution)
    }
}

impl AgentError {
    /// Classify this error into the loop's taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LlmRequestFailed { .. }
            | Self::LlmParseFailed { .. }
            | Self::RateLimited { .. }
            | Self::ProviderTimeout { .. }
            | Self::NoProviderConfigured { .. }
            | Self::MissingApiKey { .. } => ErrorKind::Provider,
            Self::BudgetExhausted { .. } => ErrorKind::BudgetExhausted,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Parse(_) => ErrorKind::Parse,
            Self::UnknownTool { .. } => ErrorKind::UnknownTool,
            Self::ToolExecutionFailed { .. } => ErrorKind::ToolExecution,
            Self::DuplicateTool { .. }
            | Self::InvalidToolName { .. }
            | Self::Config { .. }
            | Self::Toml(_) => ErrorKind::Setup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_kinds_match_loop_policy() {
        assert!(ErrorKind::Parse.is_recoverable());
        assert!(ErrorKind::UnknownTool.is_recoverable());
        assert!(ErrorKind::ToolExecution.is_recoverable());
        assert!(!ErrorKind::Provider.is_recoverable());
        assert!(!ErrorKind::BudgetExhausted.is_recoverable());
        assert!(!ErrorKind::Cancelled.is_recoverable());
    }

    #[test]
    fn parse_failures_classify_as_recoverable() {
        let err = AgentError::from(ParseError::NoMarker);
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.kind().is_recoverable());
        assert!(err.to_string().contains("Final Answer"));
    }

    #[test]
    fn provider_variants_classify_as_provider() {
        let errors = [
            AgentError::LlmRequestFailed {
                reason: "connection reset".into(),
            },
            AgentError::RateLimited {
                provider: "anthropic".into(),
                reason: "slow down".into(),
            },
            AgentError::ProviderTimeout { after_secs: 30 },
        ];
        for err in &errors {
            assert_eq!(err.kind(), ErrorKind::Provider, "{err}");
        }
    }

    #[test]
    fn display_includes_context() {
        let err = AgentError::ToolExecutionFailed {
            tool_name: "generate_diagram".into(),
            reason: "bad input".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("generate_diagram"));
        assert!(msg.contains("bad input"));

        let err = AgentError::MissingApiKey {
            provider: "openai".into(),
            env_var: "OPENAI_API_KEY".into(),
        };
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
