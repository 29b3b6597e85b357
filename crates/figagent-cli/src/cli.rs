//! CLI argument definitions for figagent.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// figagent -- turn a description into a diagram with a ReAct agent.
#[derive(Debug, Parser)]
#[command(
    name = "figagent",
    version,
    about = "figagent -- ReAct agent that turns descriptions into diagrams",
    long_about = "Drives a language model through Thought / Action / Observation steps, \
                  rendering diagrams with the built-in generate_diagram tool until the \
                  model gives a final answer."
)]
pub struct Cli {
    /// Configuration file (defaults to ./figagent.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the agent on a task.
    Run(RunArgs),

    /// Show which LLM backend would be used.
    Providers {
        /// Backend name or alias to resolve instead of auto-detecting.
        #[arg(long)]
        provider: Option<String>,
    },

    /// Render a diagram spec file without a model.
    Render {
        /// JSON or line-DSL spec; `-` reads stdin.
        file: PathBuf,

        /// Where to write the SVG; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// What to draw, in natural language.
    pub task: String,

    /// Where to write the last rendered SVG.
    #[arg(long, short, default_value = "diagram.svg")]
    pub output: PathBuf,

    /// Print the run result as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Override the iteration budget.
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Backend name or alias (anthropic, openai, groq, ollama, ...).
    #[arg(long)]
    pub provider: Option<String>,

    /// Model identifier for the selected backend.
    #[arg(long)]
    pub model: Option<String>,
}
