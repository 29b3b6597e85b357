//! CLI entry point for figagent.
//!
//! This binary provides the `figagent` command with subcommands for running
//! the agent, checking provider detection, and rendering diagram specs
//! directly.

mod cli;
mod helpers;

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use figagent_agent::{
    AgentStep, CancellationToken, ErrorKind, LlmClient, ProviderSettings, ReactAgent, ToolRegistry,
    detect_provider,
};
use figagent_diagram::DiagramTool;
use tracing::{info, warn};

use crate::cli::{Cli, Commands, RunArgs};
use crate::helpers::{Overrides, format_step, init_tracing, load_config};

/// Conventional exit status for a run interrupted with Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "info" });

    match cli.command {
        Commands::Run(args) => cmd_run(args, cli.config.as_deref()).await,
        Commands::Providers { provider } => cmd_providers(provider, cli.config.as_deref()),
        Commands::Render { file, output } => cmd_render(&file, output.as_deref()),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: run
// ---------------------------------------------------------------------------

async fn cmd_run(args: RunArgs, config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(
        config_path,
        Overrides {
            provider: args.provider,
            model: args.model,
            max_iterations: args.max_iterations,
        },
    )?;

    let agent_config = config.agent_config();
    agent_config.validate()?;

    let settings = config.provider_settings(ProviderSettings::from_env().credentials);
    let mut client_config =
        detect_provider(&settings).context("could not resolve an LLM provider")?;
    config.tune_client(&mut client_config);
    info!(
        provider = %client_config.label,
        model = %client_config.model,
        "using LLM provider"
    );
    let client = LlmClient::new(client_config)?;

    let diagram = Arc::new(DiagramTool::new());
    let mut tools = ToolRegistry::new();
    tools.register(diagram.clone())?;

    let mut agent = ReactAgent::new(Arc::new(client), Arc::new(tools), agent_config);
    if !args.json {
        let counter = AtomicUsize::new(0);
        agent = agent.with_step_callback(Arc::new(move |step: &AgentStep| {
            let number = counter.fetch_add(1, Ordering::Relaxed) + 1;
            eprint!("{}", format_step(number, step));
        }));
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n  Interrupted, stopping the run...");
                cancel.cancel();
            }
        });
    }

    let outcome = agent.run(&args.task, &cancel).await;

    // Whatever happened, keep the last diagram that rendered.
    if let Some(svg) = diagram.last_svg() {
        std::fs::write(&args.output, svg)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        info!(path = %args.output.display(), "diagram written");
    } else {
        warn!("no diagram was rendered during the run");
    }

    match outcome {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.final_answer);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&failure.report())?);
            } else {
                eprintln!(
                    "\nRun failed after {} steps: {}",
                    failure.steps.len(),
                    failure.error
                );
            }
            Ok(match failure.kind() {
                ErrorKind::Cancelled => ExitCode::from(EXIT_INTERRUPTED),
                _ => ExitCode::FAILURE,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: providers
// ---------------------------------------------------------------------------

fn cmd_providers(provider: Option<String>, config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(
        config_path,
        Overrides {
            provider,
            ..Overrides::default()
        },
    )?;
    let settings = config.provider_settings(ProviderSettings::from_env().credentials);

    match detect_provider(&settings) {
        Ok(client) => {
            println!("  Provider: {}", client.label);
            println!("  Model:    {}", client.model);
            println!("  Base URL: {}", client.base_url);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("  No usable provider: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: render
// ---------------------------------------------------------------------------

fn cmd_render(file: &Path, output: Option<&Path>) -> Result<ExitCode> {
    let source = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read spec from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?
    };

    let svg = figagent_diagram::render(&source)
        .with_context(|| format!("invalid diagram spec in {}", file.display()))?;

    match output {
        Some(path) => {
            std::fs::write(path, &svg)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "diagram written");
        }
        None => print!("{svg}"),
    }
    Ok(ExitCode::SUCCESS)
}
