//! ReAct agent runtime for figagent.
//!
//! The agent alternates between asking a model what to do and doing it:
//!
//! ```text
//! ┌──────────────┐  conversation   ┌──────────────┐
//! │  ReactAgent  │────────────────>│ ChatProvider │
//! │ (runtime.rs) │<────────────────│   (llm/)     │
//! └──────┬───────┘   raw text      └──────────────┘
//!        │ parse_step
//!        v
//! ┌──────────────┐  name + input   ┌──────────────┐
//! │  ParsedStep  │────────────────>│ ToolRegistry │
//! │ (parser.rs)  │<────────────────│  (tools.rs)  │
//! └──────────────┘   observation   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`llm`] -- Provider trait, HTTP client, and backend detection.
//! - [`parser`] -- Turns raw model output into actions or final answers.
//! - [`tools`] -- Tool trait and the name-keyed registry.
//! - [`runtime`] -- The ReAct loop, its configuration and state machine.
//! - [`prompt`] -- System prompt construction.
//! - [`transcript`] -- Steps, results and failures a run produces.
//! - [`config`] -- TOML file and environment layering.
//! - [`error`] -- Agent error types.

pub mod config;
pub mod error;
pub mod llm;
pub mod parser;
pub mod prompt;
pub mod runtime;
pub mod tools;
pub mod transcript;

// Re-export the most commonly used types at the crate root.
pub use config::{DEFAULT_CONFIG_FILE, FigagentConfig};
pub use error::{AgentError, ErrorKind, Result};
pub use llm::{
    ChatMessage, ChatProvider, LlmClient, LlmClientConfig, LlmProvider, ProviderSettings, Role,
    detect_provider,
};
pub use parser::{FINAL_ANSWER_ACTION, ParseError, ParsedStep, parse_step};
pub use runtime::{AgentConfig, LoopState, ReactAgent, StepCallback};
pub use tools::{AgentTool, FnTool, ToolError, ToolRegistry};
pub use transcript::{AgentResult, AgentStep, FailureReport, RunFailure, RunStatus};

// Re-exported so callers do not need a direct `tokio-util` dependency.
pub use tokio_util::sync::CancellationToken;
