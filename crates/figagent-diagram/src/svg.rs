//! SVG rendering.

use std::fmt::Write as _;

use crate::layout::{CHAR_WIDTH, Layout, MARGIN, Placement, TITLE_HEIGHT};
use crate::spec::{DiagramSpec, Shape};

const STROKE: &str = "#333333";
const FILL: &str = "#f5f7fb";
const FONT: &str = "Helvetica, Arial, sans-serif";

/// Escape text for use in XML content and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Render a laid-out spec as a standalone SVG document.
///
/// The output depends only on the inputs; rendering the same spec twice
/// yields identical bytes.
pub fn render_svg(spec: &DiagramSpec, layout: &Layout) -> String {
    let mut svg = String::new();
    // Writing into a String cannot fail.
    let _ = write_document(&mut svg, spec, layout);
    svg
}

fn write_document(out: &mut String, spec: &DiagramSpec, layout: &Layout) -> std::fmt::Result {
    let (w, h) = (layout.width, layout.height);
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.0} {h:.0}" font-family="{FONT}" font-size="14">"#
    )?;
    writeln!(out, "  <defs>")?;
    writeln!(
        out,
        r#"    <marker id="arrow" viewBox="0 0 10 10" refX="10" refY="5" markerWidth="8" markerHeight="8" orient="auto-start-reverse"><path d="M 0 0 L 10 5 L 0 10 z" fill="{STROKE}"/></marker>"#
    )?;
    writeln!(out, "  </defs>")?;
    writeln!(out, r##"  <rect width="100%" height="100%" fill="#ffffff"/>"##)?;

    if let Some(title) = &spec.title {
        writeln!(
            out,
            r#"  <text class="title" x="{:.1}" y="{:.1}" text-anchor="middle" font-size="18" font-weight="bold">{}</text>"#,
            w / 2.0,
            MARGIN + TITLE_HEIGHT / 2.0,
            escape_xml(title)
        )?;
    }

    writeln!(out, r#"  <g class="edges" stroke="{STROKE}" stroke-width="1.5" fill="none">"#)?;
    for (i, edge) in spec.edges.iter().enumerate() {
        let (Some(from), Some(to)) = (spec.index_of(&edge.from), spec.index_of(&edge.to)) else {
            continue;
        };
        let back = layout.back_edges.get(i).copied().unwrap_or(false);
        if from == to {
            write_self_loop(out, &layout.nodes[from], edge.label.as_deref(), back)?;
        } else {
            write_edge(
                out,
                (&layout.nodes[from], spec.nodes[from].shape),
                (&layout.nodes[to], spec.nodes[to].shape),
                edge.label.as_deref(),
                back,
            )?;
        }
    }
    writeln!(out, "  </g>")?;

    writeln!(out, r#"  <g class="nodes">"#)?;
    for (node, place) in spec.nodes.iter().zip(&layout.nodes) {
        writeln!(out, r#"    <g class="node" data-id="{}">"#, escape_xml(&node.id))?;
        write_shape(out, node.shape, place)?;
        writeln!(
            out,
            r#"      <text x="{:.1}" y="{:.1}" text-anchor="middle" dominant-baseline="middle">{}</text>"#,
            place.x,
            place.y,
            escape_xml(&node.label)
        )?;
        writeln!(out, "    </g>")?;
    }
    writeln!(out, "  </g>")?;
    writeln!(out, "</svg>")
}

fn write_shape(out: &mut String, shape: Shape, p: &Placement) -> std::fmt::Result {
    let (left, top) = (p.x - p.width / 2.0, p.y - p.height / 2.0);
    let style = format!(r#"fill="{FILL}" stroke="{STROKE}" stroke-width="1.5""#);
    match shape {
        Shape::Box => writeln!(
            out,
            r#"      <rect x="{left:.1}" y="{top:.1}" width="{:.1}" height="{:.1}" {style}/>"#,
            p.width, p.height
        ),
        Shape::Rounded => writeln!(
            out,
            r#"      <rect x="{left:.1}" y="{top:.1}" width="{:.1}" height="{:.1}" rx="14" ry="14" {style}/>"#,
            p.width, p.height
        ),
        Shape::Ellipse => writeln!(
            out,
            r#"      <ellipse cx="{:.1}" cy="{:.1}" rx="{:.1}" ry="{:.1}" {style}/>"#,
            p.x,
            p.y,
            p.width / 2.0,
            p.height / 2.0
        ),
        Shape::Diamond => writeln!(
            out,
            r#"      <polygon points="{:.1},{top:.1} {:.1},{:.1} {:.1},{:.1} {left:.1},{:.1}" {style}/>"#,
            p.x,
            p.x + p.width / 2.0,
            p.y,
            p.x,
            p.y + p.height / 2.0,
            p.y
        ),
    }
}

fn dash(back: bool) -> &'static str {
    if back { r#" stroke-dasharray="6 4""# } else { "" }
}

/// A small arc off the right-hand side of the node.
fn write_self_loop(
    out: &mut String,
    node: &Placement,
    label: Option<&str>,
    back: bool,
) -> std::fmt::Result {
    let x = node.x + node.width / 2.0;
    let (y1, y2) = (node.y - node.height / 4.0, node.y + node.height / 4.0);
    let bulge = x + 36.0;
    writeln!(
        out,
        r#"    <path class="edge" d="M {x:.1} {y1:.1} C {bulge:.1} {y1:.1}, {bulge:.1} {y2:.1}, {x:.1} {y2:.1}"{} marker-end="url(#arrow)"/>"#,
        dash(back)
    )?;
    if let Some(label) = label {
        write_edge_label(out, bulge + 4.0, node.y, label)?;
    }
    Ok(())
}

fn write_edge(
    out: &mut String,
    (from, from_shape): (&Placement, Shape),
    (to, to_shape): (&Placement, Shape),
    label: Option<&str>,
    back: bool,
) -> std::fmt::Result {
    let dash = dash(back);
    let (x1, y1) = from.boundary_toward(from_shape, to.x, to.y);
    let (x2, y2) = to.boundary_toward(to_shape, from.x, from.y);
    writeln!(
        out,
        r#"    <line class="edge" x1="{x1:.1}" y1="{y1:.1}" x2="{x2:.1}" y2="{y2:.1}"{dash} marker-end="url(#arrow)"/>"#
    )?;
    if let Some(label) = label {
        write_edge_label(out, (x1 + x2) / 2.0, (y1 + y2) / 2.0, label)?;
    }
    Ok(())
}

fn write_edge_label(out: &mut String, x: f64, y: f64, label: &str) -> std::fmt::Result {
    let width = label.chars().count() as f64 * CHAR_WIDTH * 0.9 + 8.0;
    writeln!(
        out,
        r##"    <rect class="edge-label" x="{:.1}" y="{:.1}" width="{width:.1}" height="18" fill="#ffffff" stroke="none"/>"##,
        x - width / 2.0,
        y - 9.0
    )?;
    writeln!(
        out,
        r#"    <text x="{x:.1}" y="{y:.1}" text-anchor="middle" dominant-baseline="middle" font-size="12" stroke="none" fill="{STROKE}">{}</text>"#,
        escape_xml(label)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout;

    fn render(dsl: &str) -> String {
        let spec = DiagramSpec::from_dsl(dsl).unwrap();
        render_svg(&spec, &layout(&spec))
    }

    #[test]
    fn escape_covers_xml_specials() {
        assert_eq!(
            escape_xml(r#"a<b> & "c" 'd'"#),
            "a&lt;b&gt; &amp; &quot;c&quot; &apos;d&apos;"
        );
    }

    #[test]
    fn document_structure() {
        let svg = render("title: Flow\na [Start]\na -> b");
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("<marker id=\"arrow\""));
        assert!(svg.contains(">Flow</text>"));
        assert_eq!(svg.matches("class=\"node\"").count(), 2);
        assert_eq!(svg.matches("marker-end=\"url(#arrow)\"").count(), 1);
    }

    #[test]
    fn labels_are_escaped() {
        let svg = render("a [x < y & z]\na -> b: \"yes\"");
        assert!(svg.contains(">x &lt; y &amp; z</text>"));
        assert!(svg.contains(">&quot;yes&quot;</text>"));
        assert!(!svg.contains("x < y"));
    }

    #[test]
    fn every_shape_has_an_element() {
        let svg = render("a [A]\nb (B)\nc ((C))\nd {D}");
        assert!(svg.contains("<rect x="));
        assert!(svg.contains("rx=\"14\""));
        assert!(svg.contains("<ellipse"));
        assert!(svg.contains("<polygon"));
    }

    #[test]
    fn back_edges_and_self_loops_are_dashed() {
        let svg = render("a -> b\nb -> a\nb -> b");
        assert_eq!(svg.matches("stroke-dasharray").count(), 2);
        assert!(svg.contains("<path class=\"edge\""));
    }

    #[test]
    fn rendering_is_deterministic() {
        let dsl = "direction: LR\nx -> y: one\ny -> z\nx -> z";
        assert_eq!(render(dsl), render(dsl));
    }
}
