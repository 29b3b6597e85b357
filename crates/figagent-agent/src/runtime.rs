//! Core ReAct loop runtime.
//!
//! Implements the **Reason + Act** loop that drives the agent.  Each
//! iteration sends the conversation to the model, parses the reply into a
//! step, and either dispatches the named tool and feeds its output back as an
//! `Observation:` turn, or stops on a final answer.
//!
//! Parse failures, unknown tools and failing tools are observations the model
//! can recover from.  Provider failures, cancellation and an exhausted budget
//! end the run; the steps completed so far travel with the [`RunFailure`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::llm::{ChatMessage, ChatProvider};
use crate::parser::{ParsedStep, parse_step, strip_observation};
use crate::prompt::{FORMAT_REMINDER, build_system_prompt};
use crate::tools::ToolRegistry;
use crate::transcript::{AgentResult, AgentStep, RunFailure};

/// Default number of model consultations a run may spend on actions.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
/// Default limit for one model call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);
/// Default limit for one tool call.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the ReAct loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Maximum number of non-final model consultations.  Every action,
    /// parse failure and provider timeout spends one; a final answer does not.
    pub max_iterations: u32,

    /// Upper bound on a single model call.
    pub provider_timeout: Duration,

    /// Upper bound on a single tool call.
    pub tool_timeout: Duration,

    /// Extra text appended to the system prompt.
    pub instructions: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            instructions: None,
        }
    }
}

impl AgentConfig {
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Reject settings no run could succeed with.
    ///
    /// # Errors
    ///
    /// [`AgentError::Config`] for a zero budget or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(AgentError::Config {
                reason: "max_iterations must be at least 1".into(),
            });
        }
        if self.provider_timeout.is_zero() || self.tool_timeout.is_zero() {
            return Err(AgentError::Config {
                reason: "timeouts must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loop state
// ---------------------------------------------------------------------------

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    AwaitingModel,
    AwaitingTool,
    Finished,
    Failed,
}

impl LoopState {
    /// Whether `self -> next` is a legal move.
    pub fn can_transition(self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (Running, AwaitingModel | AwaitingTool | Finished | Failed)
                | (AwaitingModel, Running | Failed)
                | (AwaitingTool, Running | Failed)
        )
    }

    /// Whether the run has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// Receives each step as soon as it is recorded.
pub type StepCallback = Arc<dyn Fn(&AgentStep) + Send + Sync>;

/// Mutable state of one run.  Never shared between runs.
struct RunState {
    run_id: Uuid,
    state: LoopState,
    messages: Vec<ChatMessage>,
    steps: Vec<AgentStep>,
    iterations: u32,
}

impl RunState {
    fn transition(&mut self, next: LoopState) {
        let legal = self.state.can_transition(next);
        debug_assert!(legal, "illegal loop transition {:?} -> {next:?}", self.state);
        if !legal {
            tracing::error!(
                run_id = %self.run_id,
                from = ?self.state,
                to = ?next,
                "illegal loop transition rejected"
            );
            return;
        }
        tracing::trace!(run_id = %self.run_id, from = ?self.state, to = ?next, "loop state");
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Drives one model and one tool registry through ReAct runs.
///
/// The agent holds no per-run state, so concurrent runs on the same instance
/// do not interfere.
#[derive(Clone)]
pub struct ReactAgent {
    provider: Arc<dyn ChatProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
    on_step: Option<StepCallback>,
}

impl fmt::Debug for ReactAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactAgent")
            .field("provider", &self.provider.provider_name())
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReactAgent {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
            on_step: None,
        }
    }

    /// Call `callback` with every step as it is recorded.
    pub fn with_step_callback(mut self, callback: StepCallback) -> Self {
        self.on_step = Some(callback);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the loop on `task` until a final answer or a terminal failure.
    ///
    /// # Errors
    ///
    /// A [`RunFailure`] carrying the steps completed so far when the provider
    /// fails, `cancel` fires, or the iteration budget runs out.
    pub async fn run(
        &self,
        task: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<AgentResult, RunFailure> {
        let started_at = Utc::now();
        let system = build_system_prompt(&self.tools, self.config.instructions.as_deref());
        let mut run = RunState {
            run_id: Uuid::now_v7(),
            state: LoopState::Running,
            messages: vec![ChatMessage::system(system), ChatMessage::user(task)],
            steps: Vec::new(),
            iterations: 0,
        };
        let run_id = run.run_id;
        let max_iterations = self.config.max_iterations;

        tracing::info!(
            run_id = %run_id,
            provider = self.provider.provider_name(),
            model = self.provider.model_name(),
            max_iterations,
            tool_count = self.tools.len(),
            "starting ReAct loop"
        );

        loop {
            if cancel.is_cancelled() {
                return Err(self.fail(run, AgentError::Cancelled { run_id }));
            }
            if run.iterations >= max_iterations {
                return Err(self.fail(
                    run,
                    AgentError::BudgetExhausted {
                        run_id,
                        max_iterations,
                    },
                ));
            }

            tracing::debug!(
                run_id = %run_id,
                iteration = run.iterations + 1,
                messages = run.messages.len(),
                "ReAct iteration start"
            );

            run.transition(LoopState::AwaitingModel);
            let reply = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(self.fail(run, AgentError::Cancelled { run_id }));
                }
                reply = tokio::time::timeout(
                    self.config.provider_timeout,
                    self.provider.send_conversation(&run.messages),
                ) => reply,
            };

            let raw = match reply {
                Ok(Ok(raw)) => raw,
                Ok(Err(error)) => return Err(self.fail(run, error)),
                Err(_elapsed) => {
                    let error = AgentError::ProviderTimeout {
                        after_secs: self.config.provider_timeout.as_secs(),
                    };
                    tracing::warn!(run_id = %run_id, %error, "retrying model call");
                    run.transition(LoopState::Running);
                    run.iterations += 1;
                    continue;
                }
            };
            run.transition(LoopState::Running);

            match parse_step(&raw) {
                Ok(ParsedStep::FinalAnswer { thought, answer }) => {
                    run.messages.push(ChatMessage::assistant(raw.trim()));
                    self.record(&mut run, AgentStep::final_answer(thought, answer.clone()));
                    run.transition(LoopState::Finished);

                    tracing::info!(
                        run_id = %run_id,
                        steps = run.steps.len(),
                        iterations = run.iterations,
                        "ReAct loop completed with final answer"
                    );

                    return Ok(AgentResult {
                        run_id,
                        total_steps: run.steps.len(),
                        steps: run.steps,
                        final_answer: answer,
                        provider: self.provider.provider_name().to_owned(),
                        started_at,
                        finished_at: Utc::now(),
                    });
                }

                Ok(ParsedStep::Action {
                    thought,
                    action,
                    action_input,
                }) => {
                    run.messages
                        .push(ChatMessage::assistant(strip_observation(&raw).trim()));

                    let observation = match self
                        .observe(&mut run, &action, &action_input, cancel)
                        .await
                    {
                        Ok(observation) => observation,
                        Err(error) => return Err(self.fail(run, error)),
                    };

                    run.messages
                        .push(ChatMessage::user(format!("Observation: {observation}")));
                    self.record(
                        &mut run,
                        AgentStep::tool(thought, action, action_input, observation),
                    );
                    run.iterations += 1;
                }

                Err(error) => {
                    let error = AgentError::from(error);
                    tracing::warn!(
                        run_id = %run_id,
                        kind = ?error.kind(),
                        %error,
                        "could not parse model output"
                    );
                    if !raw.trim().is_empty() {
                        run.messages.push(ChatMessage::assistant(raw.trim()));
                    }
                    run.messages.push(ChatMessage::user(FORMAT_REMINDER));
                    run.iterations += 1;
                }
            }
        }
    }

    /// Produce the observation for one action.
    ///
    /// Only cancellation is an error here; every tool-side problem becomes
    /// `Error: ...` text for the model.
    async fn observe(
        &self,
        run: &mut RunState,
        action: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if !self.tools.contains(action) {
            tracing::warn!(run_id = %run.run_id, tool = action, "model asked for unknown tool");
            return Ok(format!(
                "Error: unknown tool '{action}'. Available tools: {}",
                self.tools.names().join(", ")
            ));
        }
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled { run_id: run.run_id });
        }

        run.transition(LoopState::AwaitingTool);
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(AgentError::Cancelled { run_id: run.run_id });
            }
            outcome = tokio::time::timeout(
                self.config.tool_timeout,
                self.tools.dispatch(action, input),
            ) => outcome,
        };
        run.transition(LoopState::Running);

        let observation = match outcome {
            Ok(Ok(output)) if output.trim().is_empty() => "(no output)".to_owned(),
            Ok(Ok(output)) => output,
            Ok(Err(AgentError::ToolExecutionFailed { reason, .. })) => {
                tracing::warn!(run_id = %run.run_id, tool = action, %reason, "tool failed");
                format!("Error: {reason}")
            }
            Ok(Err(other)) => format!("Error: {other}"),
            Err(_elapsed) => {
                tracing::warn!(run_id = %run.run_id, tool = action, "tool timed out");
                format!(
                    "Error: tool '{action}' timed out after {}s",
                    self.config.tool_timeout.as_secs()
                )
            }
        };
        Ok(observation)
    }

    fn record(&self, run: &mut RunState, step: AgentStep) {
        tracing::debug!(
            run_id = %run.run_id,
            step = run.steps.len() + 1,
            action = %step.action,
            "step recorded"
        );
        if let Some(callback) = &self.on_step {
            callback(&step);
        }
        run.steps.push(step);
    }

    fn fail(&self, mut run: RunState, error: AgentError) -> RunFailure {
        run.transition(LoopState::Failed);
        tracing::warn!(
            run_id = %run.run_id,
            kind = ?error.kind(),
            %error,
            steps = run.steps.len(),
            "ReAct loop failed"
        );
        RunFailure {
            run_id: run.run_id,
            error,
            steps: run.steps,
            provider: self.provider.provider_name().to_owned(),
            iterations: run.iterations,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
