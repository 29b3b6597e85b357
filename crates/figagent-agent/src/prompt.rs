//! System prompt for the ReAct loop.

use crate::parser::FINAL_ANSWER_ACTION;
use crate::tools::ToolRegistry;

/// Sent as the user turn after a response that could not be parsed.
pub const FORMAT_REMINDER: &str = "Could not parse a valid action or final answer; \
respond using the required format.";

/// Build the system prompt listing every registered tool.
///
/// `instructions` are appended verbatim under their own heading.
pub fn build_system_prompt(tools: &ToolRegistry, instructions: Option<&str>) -> String {
    let tool_descriptions = if tools.is_empty() {
        "(no tools are registered; answer directly)".to_owned()
    } else {
        tools
            .descriptions()
            .iter()
            .map(|(name, description)| format!("- **{name}**: {description}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let tool_names = tools.names().join(", ");

    let mut prompt = format!(
        r#"You are a research assistant that turns technical descriptions into figures and diagrams. Work step by step and use tools instead of guessing.

## Tools

{tool_descriptions}

## Response Format

Answer every turn in exactly one of these two shapes.

To use a tool:

Thought: what you are about to do and why
Action: one of [{tool_names}]
Action Input: the input for the tool

To finish:

Thought: I now know the final answer
{FINAL_ANSWER_ACTION}: the answer for the user

After an action, stop. The result will be sent back to you as `Observation: ...`; never write an observation yourself. If an observation starts with `Error:`, read it and try again with corrected input."#
    );

    if let Some(extra) = instructions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n\n## Additional Instructions\n\n");
        prompt.push_str(extra);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::tools::FnTool;

    #[test]
    fn prompt_lists_tools_and_format() {
        let tools = ToolRegistry::new()
            .with_tool(Arc::new(FnTool::new(
                "generate_diagram",
                "Render a diagram spec to SVG.",
                |i| async move { Ok(i) },
            )))
            .unwrap();

        let prompt = build_system_prompt(&tools, None);
        assert!(prompt.contains("- **generate_diagram**: Render a diagram spec to SVG."));
        assert!(prompt.contains("Action: one of [generate_diagram]"));
        assert!(prompt.contains("Final Answer:"));
        assert!(!prompt.contains("Additional Instructions"));
    }

    #[test]
    fn instructions_are_appended() {
        let prompt = build_system_prompt(&ToolRegistry::new(), Some("  Prefer LR layouts. "));
        assert!(prompt.ends_with("## Additional Instructions\n\nPrefer LR layouts."));
        assert!(prompt.contains("no tools are registered"));
    }

    #[test]
    fn blank_instructions_are_ignored() {
        let prompt = build_system_prompt(&ToolRegistry::new(), Some("   "));
        assert!(!prompt.contains("Additional Instructions"));
    }
}
