//! ReAct step parser.
//!
//! Turns one raw model response into a [`ParsedStep`]: either a tool request
//! (`Thought` / `Action` / `Action Input`) or a conclusion (`Final Answer`).
//! The loop never inspects raw model text itself; everything it needs comes
//! through this module.
//!
//! Labels are matched case-insensitively at the start of a line and may be
//! decorated with markdown (`**Action:**`, `> Thought:`, `- Final Answer:`).
//! When a response carries both an action and a final answer, the final
//! answer wins so ambiguous output cannot keep a run alive forever.

use std::sync::LazyLock;

use regex::Regex;

/// The `action` recorded on a terminal step.
pub const FINAL_ANSWER_ACTION: &str = "Final Answer";

/// Matches one section label at the start of a line.
///
/// `action input` precedes `action` in the alternation so the longer label
/// wins.  Group 1 is the markdown decoration before the label.
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^([ \t>*_#-]*)(final[ \t]+answer|action[ \t]+input|action|thought|observation)[ \t*_]*:[ \t*_]*",
    )
    .expect("label regex is valid")
});

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The two shapes a model response can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedStep {
    /// The model wants a tool invoked.
    Action {
        thought: String,
        action: String,
        action_input: String,
    },
    /// The model has concluded the task.
    FinalAnswer { thought: String, answer: String },
}

impl ParsedStep {
    /// The reasoning text that preceded the action or answer.
    pub fn thought(&self) -> &str {
        match self {
            Self::Action { thought, .. } | Self::FinalAnswer { thought, .. } => thought,
        }
    }

    /// Whether this step ends the run.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. })
    }
}

/// Why a response could not be turned into a step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Neither an `Action:` nor a `Final Answer:` label was found.
    #[error("no `Action:` or `Final Answer:` marker found")]
    NoMarker,

    /// An `Action:` label was found but it names no tool.
    #[error("`Action:` marker present but no tool name given")]
    EmptyAction,

    /// A `Final Answer:` label was found with nothing after it.
    #[error("`Final Answer:` marker present but the answer is empty")]
    EmptyFinalAnswer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Thought,
    Action,
    ActionInput,
    FinalAnswer,
    Observation,
}

impl Label {
    fn from_match(text: &str) -> Self {
        let lower = text.to_ascii_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();
        match words.as_slice() {
            ["final", "answer"] => Self::FinalAnswer,
            ["action", "input"] => Self::ActionInput,
            ["action"] => Self::Action,
            ["thought"] => Self::Thought,
            _ => Self::Observation,
        }
    }
}

/// A labelled slice of the response.
#[derive(Debug)]
struct Section<'a> {
    label: Label,
    body: &'a str,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse one raw model response.
///
/// The result is deterministic and side-effect free.  Whether the named tool
/// exists is not checked here; the loop reports that separately.
pub fn parse_step(raw: &str) -> Result<ParsedStep, ParseError> {
    let (preamble, sections) = split_sections(raw);

    let find = |label: Label| sections.iter().find(|s| s.label == label).map(|s| s.body);

    let thought = find(Label::Thought)
        .unwrap_or(preamble)
        .trim()
        .to_owned();

    if let Some(body) = find(Label::FinalAnswer) {
        let answer = body.trim();
        if answer.is_empty() {
            return Err(ParseError::EmptyFinalAnswer);
        }
        return Ok(ParsedStep::FinalAnswer {
            thought,
            answer: answer.to_owned(),
        });
    }

    let Some(action_body) = find(Label::Action) else {
        return Err(ParseError::NoMarker);
    };

    let action_body = action_body.trim();
    let (first_line, rest) = match action_body.split_once('\n') {
        Some((first, rest)) => (first.trim(), rest),
        None => (action_body, ""),
    };

    let explicit_input = find(Label::ActionInput);

    // `Action: tool[input]` shorthand, only when no separate input is given.
    let (name, inline_input) = match (explicit_input, first_line.split_once('[')) {
        (None, Some((name, tail))) if tail.ends_with(']') && !name.trim().is_empty() => {
            (name, Some(&tail[..tail.len() - 1]))
        }
        _ => (first_line, None),
    };

    let action = clean_action_name(name);
    if action.is_empty() {
        return Err(ParseError::EmptyAction);
    }

    let action_input = match (explicit_input, inline_input) {
        (Some(input), _) => clean_action_input(input),
        (None, Some(input)) => clean_action_input(input),
        (None, None) => clean_action_input(rest),
    };

    Ok(ParsedStep::Action {
        thought,
        action,
        action_input,
    })
}

/// Cut a response at the first `Observation:` label.
///
/// Models sometimes continue past their action and invent the tool's
/// answer.  Only the part before that invention belongs in the conversation.
pub fn strip_observation(raw: &str) -> &str {
    find_labels(raw)
        .into_iter()
        .find(|(_, _, label)| *label == Label::Observation)
        .map(|(start, _, _)| raw[..start].trim_end())
        .unwrap_or(raw)
}

/// Locate every section label as `(start, body_start, label)`.
///
/// Inside an `Action Input` body a `#`-prefixed line is a comment of the
/// tool's own input language, never a new label.
fn find_labels(raw: &str) -> Vec<(usize, usize, Label)> {
    let mut labels: Vec<(usize, usize, Label)> = Vec::new();
    for caps in LABEL_RE.captures_iter(raw) {
        let (Some(whole), Some(decoration)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let in_input = labels
            .last()
            .is_some_and(|(_, _, label)| *label == Label::ActionInput);
        if in_input && decoration.as_str().contains('#') {
            continue;
        }
        labels.push((whole.start(), whole.end(), Label::from_match(&caps[2])));
    }
    labels
}

/// Split the response into the text before any label plus labelled sections.
fn split_sections(raw: &str) -> (&str, Vec<Section<'_>>) {
    let matches = find_labels(raw);

    let preamble = matches.first().map_or(raw, |(start, _, _)| &raw[..*start]);

    let sections = matches
        .iter()
        .enumerate()
        .map(|(i, (_, body_start, label))| {
            let body_end = matches.get(i + 1).map_or(raw.len(), |next| next.0);
            Section {
                label: *label,
                body: &raw[*body_start..body_end],
            }
        })
        .collect();

    (preamble, sections)
}

fn clean_action_name(name: &str) -> String {
    name.trim()
        .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | '*' | '[' | ']' | '(' | ')'))
        .trim_end_matches(['.', ':', ','])
        .trim()
        .to_owned()
}

fn clean_action_input(input: &str) -> String {
    let mut text = input.trim();

    if let Some(fenced) = text.strip_prefix("```") {
        text = match fenced.split_once('\n') {
            // Drop the optional language tag on the opening fence line.
            Some((_, body)) => body.trim_end().strip_suffix("```").unwrap_or(body),
            None => fenced.strip_suffix("```").unwrap_or(fenced),
        }
        .trim();
    }

    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
            && !has_unescaped(inner, quote)
        {
            text = inner;
            break;
        }
    }

    text.to_owned()
}

/// Whether `quote` occurs in `text` without a preceding backslash.
fn has_unescaped(text: &str, quote: char) -> bool {
    let mut escaped = false;
    for c in text.chars() {
        match c {
            '\\' if !escaped => escaped = true,
            c if c == quote && !escaped => return true,
            _ => escaped = false,
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
