//! Diagram error types.

/// Why a specification could not be turned into a diagram.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiagramError {
    /// The specification declares no nodes.
    #[error("diagram has no nodes")]
    Empty,

    /// An edge refers to a node id that was never declared.
    #[error("edge {from} -> {to} references unknown node `{missing}`")]
    UnknownNode {
        from: String,
        to: String,
        missing: String,
    },

    /// Two nodes share an id.
    #[error("node `{id}` is declared more than once")]
    DuplicateNode { id: String },

    /// The input looked like JSON but did not match the expected shape.
    #[error("invalid JSON spec: {reason}")]
    InvalidJson { reason: String },

    /// A DSL line could not be understood.
    #[error("line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },
}

impl From<serde_json::Error> for DiagramError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson {
            reason: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the diagram crate.
pub type Result<T> = std::result::Result<T, DiagramError>;
