//! What a run leaves behind: its steps, its result, or its failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgentError, ErrorKind};
use crate::parser::FINAL_ANSWER_ACTION;

/// One completed Thought → Action → Observation cycle, or the terminal
/// Thought → Final Answer step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStep {
    pub thought: String,
    /// Tool name, or [`FINAL_ANSWER_ACTION`] on the terminal step.
    pub action: String,
    /// Text passed to the tool, or the final answer.
    pub action_input: String,
    /// Tool output (or encoded failure); empty on the terminal step.
    pub observation: String,
}

impl AgentStep {
    /// A tool step.
    pub fn tool(
        thought: impl Into<String>,
        action: impl Into<String>,
        action_input: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            thought: thought.into(),
            action: action.into(),
            action_input: action_input.into(),
            observation: observation.into(),
        }
    }

    /// The terminal step carrying the final answer.
    pub fn final_answer(thought: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            action: FINAL_ANSWER_ACTION.to_owned(),
            action_input: answer.into(),
            observation: String::new(),
        }
    }

    /// Whether this is the terminal step.
    pub fn is_final(&self) -> bool {
        self.action == FINAL_ANSWER_ACTION
    }
}

/// Explicit outcome marker for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Finished,
    Failed,
}

/// The output of a run that reached a final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub run_id: Uuid,
    pub steps: Vec<AgentStep>,
    pub final_answer: String,
    /// Always equal to `steps.len()`.
    pub total_steps: usize,
    /// Backend that answered the run.
    pub provider: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AgentResult {
    pub fn status(&self) -> RunStatus {
        RunStatus::Finished
    }

    /// Steps that invoked a tool (everything but the terminal step).
    pub fn tool_steps(&self) -> impl Iterator<Item = &AgentStep> {
        self.steps.iter().filter(|s| !s.is_final())
    }
}

/// A run that ended without a final answer.
///
/// The partial transcript is always kept so no completed work is lost.
#[derive(Debug, thiserror::Error)]
#[error("agent run failed after {iterations} iterations: {error}")]
pub struct RunFailure {
    pub run_id: Uuid,
    #[source]
    pub error: AgentError,
    pub steps: Vec<AgentStep>,
    pub provider: String,
    pub iterations: u32,
}

impl RunFailure {
    pub fn status(&self) -> RunStatus {
        RunStatus::Failed
    }

    /// Which terminal condition ended the run.
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// Serializable summary for logs and `--json` output.
    pub fn report(&self) -> FailureReport {
        FailureReport {
            run_id: self.run_id,
            status: RunStatus::Failed,
            kind: self.kind(),
            message: self.error.to_string(),
            steps: self.steps.clone(),
            total_steps: self.steps.len(),
            provider: self.provider.clone(),
            iterations: self.iterations,
        }
    }
}

/// Serialized form of a [`RunFailure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub kind: ErrorKind,
    pub message: String,
    pub steps: Vec<AgentStep>,
    pub total_steps: usize,
    pub provider: String,
    pub iterations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> AgentResult {
        let steps = vec![
            AgentStep::tool(
                "Render the pipeline",
                "generate_diagram",
                "encoder -> decoder: latent",
                "Error: invalid line 1",
            ),
            AgentStep::tool(
                "Fix the syntax",
                "generate_diagram",
                "encoder -> decoder : latent",
                "<svg>…</svg>",
            ),
            AgentStep::final_answer("Done", "Diagram rendered with 2 nodes."),
        ];
        AgentResult {
            run_id: Uuid::now_v7(),
            total_steps: steps.len(),
            steps,
            final_answer: "Diagram rendered with 2 nodes.".into(),
            provider: "anthropic".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn result_survives_json_round_trip() {
        let result = sample_result();
        let json = serde_json::to_string(&result).unwrap();
        let parsed: AgentResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
        assert_eq!(parsed.total_steps, parsed.steps.len());
        assert!(parsed.steps.last().unwrap().is_final());
    }

    #[test]
    fn step_uses_camel_case_keys() {
        let json = serde_json::to_value(AgentStep::final_answer("t", "a")).unwrap();
        assert_eq!(json["actionInput"], "a");
        assert_eq!(json["action"], FINAL_ANSWER_ACTION);
        assert_eq!(json["observation"], "");
    }

    #[test]
    fn tool_steps_skip_terminal_step() {
        let result = sample_result();
        assert_eq!(result.tool_steps().count(), 2);
        assert_eq!(result.status(), RunStatus::Finished);
    }

    #[test]
    fn failure_report_keeps_partial_transcript() {
        let failure = RunFailure {
            run_id: Uuid::now_v7(),
            error: AgentError::BudgetExhausted {
                run_id: Uuid::nil(),
                max_iterations: 3,
            },
            steps: vec![AgentStep::tool("t", "lookup", "q", "Error: unknown tool 'lookup'")],
            provider: "stub".into(),
            iterations: 3,
        };
        let report = failure.report();
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.kind, ErrorKind::BudgetExhausted);
        assert_eq!(report.total_steps, 1);
        assert!(report.message.contains("budget of 3"));
    }
}
