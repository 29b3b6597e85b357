//! Shared helpers for the CLI subcommands.

use std::path::Path;

use anyhow::{Context, Result};
use figagent_agent::{AgentStep, FigagentConfig};
use tracing_subscriber::EnvFilter;

/// Longest observation echoed to the terminal.
const PREVIEW_CHARS: usize = 160;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the global tracing subscriber.
///
/// Logs go to stderr so `--json` output on stdout stays machine-readable.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Command-line values that win over file and environment settings.
#[derive(Debug, Default)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_iterations: Option<u32>,
}

/// Defaults, then the TOML file, then `FIGAGENT_*` variables, then flags.
pub fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<FigagentConfig> {
    let mut config = FigagentConfig::discover(path).context("failed to load configuration")?;
    config
        .apply_env(|name| std::env::var(name).ok())
        .context("invalid FIGAGENT_* environment")?;
    apply_overrides(&mut config, overrides);
    Ok(config)
}

fn apply_overrides(config: &mut FigagentConfig, overrides: Overrides) {
    if let Some(provider) = overrides.provider {
        config.provider.name = Some(provider);
    }
    if let Some(model) = overrides.model {
        config.provider.model = Some(model);
    }
    if let Some(n) = overrides.max_iterations {
        config.agent.max_iterations = Some(n);
    }
}

// ---------------------------------------------------------------------------
// Transcript output
// ---------------------------------------------------------------------------

/// One step as printed while the agent runs.
pub fn format_step(number: usize, step: &AgentStep) -> String {
    let mut out = format!("── step {number} ──\n");
    if !step.thought.is_empty() {
        out.push_str(&format!("Thought: {}\n", step.thought));
    }
    if step.is_final() {
        out.push_str(&format!("Final Answer: {}\n", step.action_input));
    } else {
        out.push_str(&format!("Action: {}\n", step.action));
        if !step.action_input.is_empty() {
            out.push_str(&format!("Action Input: {}\n", preview(&step.action_input)));
        }
        out.push_str(&format!("Observation: {}\n", preview(&step.observation)));
    }
    out
}

/// First line of `text`, cut to a readable length.
pub fn preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    let truncated = first_line.chars().count() > PREVIEW_CHARS || text.lines().nth(1).is_some();
    let mut out: String = first_line.chars().take(PREVIEW_CHARS).collect();
    if truncated {
        out.push_str(" …");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn overrides_beat_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[agent]\nmax_iterations = 12\n[provider]\nname = \"openai\"\nmodel = \"gpt-4o\""
        )
        .unwrap();

        let mut config = FigagentConfig::load(file.path()).unwrap();
        apply_overrides(
            &mut config,
            Overrides {
                provider: Some("anthropic".into()),
                model: None,
                max_iterations: Some(3),
            },
        );

        assert_eq!(config.provider.name.as_deref(), Some("anthropic"));
        assert_eq!(config.provider.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.agent_config().max_iterations, 3);
    }

    #[test]
    fn preview_cuts_long_and_multiline_text() {
        assert_eq!(preview("short"), "short");
        assert_eq!(preview("<svg>\n<g/>\n</svg>"), "<svg> …");
        let long = "x".repeat(500);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS + 2);
    }

    #[test]
    fn final_step_formatting() {
        let text = format_step(2, &AgentStep::final_answer("done", "Here it is."));
        assert!(text.contains("step 2"));
        assert!(text.contains("Final Answer: Here it is."));
        assert!(!text.contains("Observation"));
    }

    #[test]
    fn tool_step_formatting() {
        let step = AgentStep::tool("draw", "generate_diagram", "a -> b", "<svg>\n</svg>");
        let text = format_step(1, &step);
        assert!(text.contains("Action: generate_diagram"));
        assert!(text.contains("Action Input: a -> b"));
        assert!(text.contains("Observation: <svg> …"));
    }
}
