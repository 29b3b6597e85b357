//! Diagram specifications and their two input formats.
//!
//! JSON:
//!
//! ```json
//! {"title": "Pipeline", "direction": "LR",
//!  "nodes": [{"id": "enc", "label": "Encoder"}, {"id": "dec", "shape": "rounded"}],
//!  "edges": [{"from": "enc", "to": "dec", "label": "latent"}]}
//! ```
//!
//! Line DSL, one statement per line:
//!
//! ```text
//! title: Pipeline
//! direction: LR
//! # comments start with '#'
//! enc [Encoder]          box
//! dec (Decoder)          rounded
//! loss ((Loss))          ellipse
//! ok {Converged?}        diamond
//! enc -> dec: latent
//! dec -> loss -> ok
//! ```
//!
//! DSL edges create any node they mention; JSON edges must refer to declared
//! nodes.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DiagramError, Result};

// ═══════════════════════════════════════════════════════════════════════
//  Model
// ═══════════════════════════════════════════════════════════════════════

/// Flow direction of the layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Top to bottom.
    #[default]
    #[serde(rename = "TB", alias = "TD", alias = "tb", alias = "td")]
    TopBottom,
    /// Left to right.
    #[serde(rename = "LR", alias = "lr")]
    LeftRight,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TB" | "TD" => Ok(Self::TopBottom),
            "LR" => Ok(Self::LeftRight),
            other => Err(format!("unknown direction `{other}` (expected TB or LR)")),
        }
    }
}

/// Outline drawn around a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Box,
    Rounded,
    Ellipse,
    Diamond,
}

impl FromStr for Shape {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "box" | "rect" => Ok(Self::Box),
            "rounded" => Ok(Self::Rounded),
            "ellipse" | "circle" => Ok(Self::Ellipse),
            "diamond" => Ok(Self::Diamond),
            other => Err(format!("unknown shape `{other}`")),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Box => "box",
            Self::Rounded => "rounded",
            Self::Ellipse => "ellipse",
            Self::Diamond => "diamond",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    /// Text drawn inside the node; the id when not given.
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub shape: Shape,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            shape: Shape::Box,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A validated diagram: non-empty, unique ids, every edge endpoint declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl DiagramSpec {
    /// Parse either format; input whose first character is `{` is JSON.
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim_start().starts_with('{') {
            Self::from_json(input)
        } else {
            Self::from_dsl(input)
        }
    }

    pub fn from_json(input: &str) -> Result<Self> {
        let mut spec: Self = serde_json::from_str(input)?;
        for node in &mut spec.nodes {
            if node.label.trim().is_empty() {
                node.label = node.id.clone();
            }
        }
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_dsl(input: &str) -> Result<Self> {
        let mut builder = DslBuilder::default();
        for (index, line) in input.lines().enumerate() {
            builder.line(index + 1, line)?;
        }
        let spec = builder.spec;
        spec.validate()?;
        Ok(spec)
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(DiagramError::Empty);
        }

        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(DiagramError::InvalidJson {
                    reason: "node id must not be empty".into(),
                });
            }
            if !ids.insert(node.id.as_str()) {
                return Err(DiagramError::DuplicateNode {
                    id: node.id.clone(),
                });
            }
        }

        for edge in &self.edges {
            for end in [&edge.from, &edge.to] {
                if !ids.contains(end.as_str()) {
                    return Err(DiagramError::UnknownNode {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        missing: end.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Position of the node with this id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  DSL
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct DslBuilder {
    spec: DiagramSpec,
    /// Ids given an explicit declaration line (as opposed to edge mentions).
    declared: HashSet<String>,
}

impl DslBuilder {
    fn line(&mut self, line_no: usize, raw: &str) -> Result<()> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        let invalid = |reason: String| DiagramError::InvalidLine {
            line: line_no,
            reason,
        };

        if let Some(value) = directive(line, "title") {
            self.spec.title = Some(value.to_owned()).filter(|t| !t.is_empty());
            return Ok(());
        }
        if let Some(value) = directive(line, "direction") {
            self.spec.direction = value.parse().map_err(invalid)?;
            return Ok(());
        }

        // Ids never contain `:`, so the first one starts the edge label.
        if line.split(':').next().is_some_and(|chain| chain.contains("->")) {
            return self.edge_chain(line).map_err(invalid);
        }

        let node = parse_node(line).map_err(invalid)?;
        self.declare(node)
    }

    fn edge_chain(&mut self, line: &str) -> std::result::Result<(), String> {
        // A label can only follow the last endpoint.
        let (chain, label) = match line.split_once(':') {
            Some((chain, text)) => {
                let text = text.trim();
                (chain, (!text.is_empty()).then(|| text.to_owned()))
            }
            None => (line, None),
        };
        let parts: Vec<&str> = chain.split("->").map(str::trim).collect();

        for part in &parts {
            if !is_valid_id(part) {
                return Err(format!("invalid node id `{part}` in edge"));
            }
        }
        for part in &parts {
            self.mention(part);
        }

        let hops = parts.len() - 1;
        for (i, pair) in parts.windows(2).enumerate() {
            self.spec.edges.push(Edge {
                from: pair[0].to_owned(),
                to: pair[1].to_owned(),
                label: if i + 1 == hops { label.clone() } else { None },
            });
        }
        Ok(())
    }

    fn mention(&mut self, id: &str) {
        if self.spec.index_of(id).is_none() {
            self.spec.nodes.push(Node::new(id));
        }
    }

    fn declare(&mut self, node: Node) -> Result<()> {
        if !self.declared.insert(node.id.clone()) {
            return Err(DiagramError::DuplicateNode { id: node.id });
        }
        match self.spec.index_of(&node.id) {
            Some(i) => self.spec.nodes[i] = node,
            None => self.spec.nodes.push(node),
        }
        Ok(())
    }
}

/// `key: value` with a case-insensitive key.
fn directive<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (head, value) = line.split_once(':')?;
    head.trim()
        .eq_ignore_ascii_case(key)
        .then(|| value.trim())
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// `id`, `id [label]`, `id (label)`, `id ((label))` or `id {label}`.
fn parse_node(line: &str) -> std::result::Result<Node, String> {
    let split = line
        .find(|c: char| c.is_whitespace() || matches!(c, '[' | '(' | '{'))
        .unwrap_or(line.len());
    let (id, rest) = line.split_at(split);
    if !is_valid_id(id) {
        return Err(format!("invalid node id `{id}`"));
    }
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(Node::new(id));
    }

    let delimiters: [(&str, &str, Shape); 4] = [
        ("((", "))", Shape::Ellipse),
        ("[", "]", Shape::Box),
        ("(", ")", Shape::Rounded),
        ("{", "}", Shape::Diamond),
    ];
    for (open, close, shape) in delimiters {
        if let Some(inner) = rest
            .strip_prefix(open)
            .and_then(|r| r.strip_suffix(close))
        {
            let label = inner.trim();
            let label = if label.is_empty() { id } else { label };
            return Ok(Node::new(id).with_label(label).with_shape(shape));
        }
    }
    Err(format!("cannot parse node declaration `{line}`"))
}
