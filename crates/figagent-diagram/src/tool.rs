//! The diagram generator exposed to the agent as a tool.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use figagent_agent::tools::{AgentTool, ToolError};

use crate::render;

/// Name the model uses to call the generator.
pub const TOOL_NAME: &str = "generate_diagram";

const DESCRIPTION: &str = "Render a diagram to SVG. Input is either JSON \
{\"title\", \"direction\": \"TB\"|\"LR\", \"nodes\": [{\"id\", \"label\", \"shape\"}], \
\"edges\": [{\"from\", \"to\", \"label\"}]} with shapes box, rounded, ellipse, diamond; \
or one statement per line: `title: ...`, `direction: LR`, `id [Label]` (box), \
`id (Label)` (rounded), `id ((Label))` (ellipse), `id {Label}` (diamond), \
`a -> b` or `a -> b: label`. Returns the SVG markup.";

/// Renders specs to SVG and keeps the most recent successful render.
#[derive(Debug, Default)]
pub struct DiagramTool {
    last: Mutex<Option<String>>,
}

impl DiagramTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// The SVG produced by the last successful call, if any.
    pub fn last_svg(&self) -> Option<String> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AgentTool for DiagramTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let svg = render(input).map_err(|e| {
            tracing::debug!(error = %e, "diagram spec rejected");
            ToolError::InvalidInput(e.to_string())
        })?;

        tracing::info!(bytes = svg.len(), "diagram rendered");
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(svg.clone());
        Ok(svg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_returns_and_keeps_svg() {
        let tool = DiagramTool::new();
        assert!(tool.last_svg().is_none());

        let svg = tool.execute("a -> b").await.unwrap();
        assert!(svg.contains("<svg"));
        assert_eq!(tool.last_svg().as_deref(), Some(svg.as_str()));
    }

    #[tokio::test]
    async fn bad_input_keeps_previous_render() {
        let tool = DiagramTool::new();
        let first = tool.execute("a -> b").await.unwrap();

        let err = tool.execute("{\"nodes\": []}").await.unwrap_err();
        assert_eq!(err, ToolError::InvalidInput("diagram has no nodes".into()));
        assert_eq!(tool.last_svg(), Some(first));
    }

    #[test]
    fn metadata() {
        let tool = DiagramTool::new();
        assert_eq!(tool.name(), "generate_diagram");
        assert!(tool.description().contains("SVG"));
    }
}
