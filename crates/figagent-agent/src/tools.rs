//! Tool capabilities and the registry the agent loop dispatches through.
//!
//! Every tool has the same shape: a unique name, a description shown to the
//! model, and an async `execute` that maps one string to another.  The
//! registry is populated before a run and shared read-only (`Arc`) between
//! iterations and between concurrent runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::{AgentError, Result};

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

/// Failure reported by a tool's execute operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// The input could not be understood by the tool.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The tool understood the input but could not complete.
    #[error("{0}")]
    Failed(String),
}

/// A named capability the model can invoke with text and get text back.
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// Unique name the model uses in `Action:` lines.
    fn name(&self) -> &str;

    /// Explains to the model when and how to use the tool.
    fn description(&self) -> &str;

    /// Run the tool.
    async fn execute(&self, input: &str) -> std::result::Result<String, ToolError>;
}

type ToolFn =
    dyn Fn(String) -> BoxFuture<'static, std::result::Result<String, ToolError>> + Send + Sync;

/// A tool backed by an async closure.
///
/// ```rust
/// # use figagent_agent::tools::{FnTool, ToolError};
/// let echo = FnTool::new("echo", "Repeats its input.", |input| async move {
///     Ok::<_, ToolError>(input)
/// });
/// ```
pub struct FnTool {
    name: String,
    description: String,
    func: Box<ToolFn>,
}

impl FnTool {
    /// Wrap an async closure as a tool.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<String, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            func: Box::new(move |input| Box::pin(func(input))),
        }
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AgentTool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, input: &str) -> std::result::Result<String, ToolError> {
        (self.func)(input.to_owned()).await
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name-keyed set of tools, kept in registration order for prompts.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool.
    ///
    /// # Errors
    ///
    /// [`AgentError::DuplicateTool`] if the name is taken, and
    /// [`AgentError::InvalidToolName`] if it is empty or contains whitespace.
    pub fn register(&mut self, tool: Arc<dyn AgentTool>) -> Result<()> {
        let name = tool.name().to_owned();

        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(AgentError::InvalidToolName { tool_name: name });
        }
        if self.tools.contains_key(&name) {
            return Err(AgentError::DuplicateTool { tool_name: name });
        }

        tracing::debug!(tool = %name, "tool registered");
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_tool(mut self, tool: Arc<dyn AgentTool>) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    /// Look up a tool and run it on `input`.
    ///
    /// # Errors
    ///
    /// [`AgentError::UnknownTool`] without invoking anything when the name is
    /// absent, [`AgentError::ToolExecutionFailed`] when the tool fails.  No
    /// retries happen here.
    pub async fn dispatch(&self, name: &str, input: &str) -> Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool {
                tool_name: name.to_owned(),
            })?;

        tracing::debug!(tool = %name, input_len = input.len(), "dispatching tool");

        tool.execute(input)
            .await
            .map_err(|e| AgentError::ToolExecutionFailed {
                tool_name: name.to_owned(),
                reason: e.to_string(),
            })
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// `(name, description)` pairs in registration order.
    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| (tool.name(), tool.description()))
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}
