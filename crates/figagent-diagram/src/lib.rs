//! Diagram generator for figagent.
//!
//! Turns a small graph description (JSON or a line DSL, see [`spec`]) into a
//! standalone SVG document:
//!
//! ```text
//! input text ──> DiagramSpec ──> Layout ──> SVG
//!              (spec.rs)      (layout.rs) (svg.rs)
//! ```
//!
//! [`DiagramTool`] wraps the pipeline as an agent tool.

pub mod error;
pub mod layout;
pub mod spec;
pub mod svg;
pub mod tool;

pub use error::{DiagramError, Result};
pub use layout::{Layout, Placement, layout};
pub use spec::{DiagramSpec, Direction, Edge, Node, Shape};
pub use svg::{escape_xml, render_svg};
pub use tool::{DiagramTool, TOOL_NAME};

/// Parse `input` and render it to SVG.
pub fn render(input: &str) -> Result<String> {
    let spec = DiagramSpec::parse(input)?;
    let layout = layout::layout(&spec);
    tracing::debug!(
        nodes = spec.nodes.len(),
        edges = spec.edges.len(),
        layers = layout.layer_count,
        "diagram laid out"
    );
    Ok(render_svg(&spec, &layout))
}
