//! Layered layout.
//!
//! Nodes are assigned to layers by longest path from the sources, after
//! dropping the back edges a depth-first search finds (so cycles still lay
//! out).  Inside a layer nodes keep the order they were declared in.  Every
//! node gets the same size, wide enough for the longest label.

use std::collections::{HashMap, VecDeque};

use crate::spec::{DiagramSpec, Direction, Shape};

pub const NODE_HEIGHT: f64 = 56.0;
pub const MARGIN: f64 = 32.0;
pub const TITLE_HEIGHT: f64 = 40.0;
pub const CHAR_WIDTH: f64 = 8.0;

const MIN_NODE_WIDTH: f64 = 120.0;
const LABEL_PADDING: f64 = 32.0;
const LAYER_GAP: f64 = 72.0;
const SIBLING_GAP: f64 = 40.0;

/// Where one node ends up.  `x` and `y` are the centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub layer: usize,
    pub rank: usize,
}

impl Placement {
    /// Point on the node outline in the direction of `(tx, ty)`.
    pub fn boundary_toward(&self, shape: Shape, tx: f64, ty: f64) -> (f64, f64) {
        let (dx, dy) = (tx - self.x, ty - self.y);
        if dx == 0.0 && dy == 0.0 {
            return (self.x, self.y);
        }
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);
        let t = match shape {
            Shape::Box | Shape::Rounded => {
                let tx = if dx == 0.0 { f64::INFINITY } else { hw / dx.abs() };
                let ty = if dy == 0.0 { f64::INFINITY } else { hh / dy.abs() };
                tx.min(ty)
            }
            Shape::Ellipse => 1.0 / ((dx / hw).powi(2) + (dy / hh).powi(2)).sqrt(),
            Shape::Diamond => 1.0 / (dx.abs() / hw + dy.abs() / hh),
        };
        (self.x + dx * t, self.y + dy * t)
    }
}

/// The computed geometry of a diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub width: f64,
    pub height: f64,
    /// Same order as `spec.nodes`.
    pub nodes: Vec<Placement>,
    /// Same order as `spec.edges`; `true` for edges ignored during layering.
    pub back_edges: Vec<bool>,
    pub layer_count: usize,
}

/// Lay out a validated spec.
pub fn layout(spec: &DiagramSpec) -> Layout {
    let index: HashMap<&str, usize> = spec
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); spec.nodes.len()];
    for (e, edge) in spec.edges.iter().enumerate() {
        if let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
        {
            adjacency[from].push((e, to));
        }
    }

    let back_edges = find_back_edges(&adjacency, spec.edges.len());
    let layers = longest_path_layers(&adjacency, &back_edges);
    let layer_count = layers.iter().max().map_or(0, |l| l + 1);

    let mut per_layer = vec![0usize; layer_count];
    let ranks: Vec<usize> = layers
        .iter()
        .map(|&l| {
            let rank = per_layer[l];
            per_layer[l] += 1;
            rank
        })
        .collect();
    let widest_layer = per_layer.iter().copied().max().unwrap_or(0);

    let longest_label = spec
        .nodes
        .iter()
        .map(|n| n.label.chars().count())
        .max()
        .unwrap_or(0);
    let node_width = (longest_label as f64 * CHAR_WIDTH + LABEL_PADDING).max(MIN_NODE_WIDTH);
    let title_height = if spec.title.is_some() { TITLE_HEIGHT } else { 0.0 };
    let title_width = spec
        .title
        .as_deref()
        .map_or(0.0, |t| t.chars().count() as f64 * CHAR_WIDTH * 1.25);

    let (main_step, cross_size, cross_gap) = match spec.direction {
        Direction::TopBottom => (NODE_HEIGHT + LAYER_GAP, node_width, SIBLING_GAP),
        Direction::LeftRight => (node_width + LAYER_GAP, NODE_HEIGHT, SIBLING_GAP),
    };
    let main_size = match spec.direction {
        Direction::TopBottom => NODE_HEIGHT,
        Direction::LeftRight => node_width,
    };
    let main_extent = span(layer_count, main_size, main_step - main_size);
    let cross_extent = span(widest_layer, cross_size, cross_gap);

    let (content_w, content_h) = match spec.direction {
        Direction::TopBottom => (cross_extent, main_extent),
        Direction::LeftRight => (main_extent, cross_extent),
    };
    let width = content_w.max(title_width) + 2.0 * MARGIN;
    let height = content_h + title_height + 2.0 * MARGIN;

    let available_cross = match spec.direction {
        Direction::TopBottom => width - 2.0 * MARGIN,
        Direction::LeftRight => cross_extent,
    };

    let nodes = layers
        .iter()
        .zip(&ranks)
        .map(|(&layer, &rank)| {
            let extent = span(per_layer[layer], cross_size, cross_gap);
            let cross_start = (available_cross - extent) / 2.0;
            let main = layer as f64 * main_step + main_size / 2.0;
            let cross = cross_start + rank as f64 * (cross_size + cross_gap) + cross_size / 2.0;
            let (x, y) = match spec.direction {
                Direction::TopBottom => (MARGIN + cross, MARGIN + title_height + main),
                Direction::LeftRight => (MARGIN + main, MARGIN + title_height + cross),
            };
            Placement {
                x,
                y,
                width: node_width,
                height: NODE_HEIGHT,
                layer,
                rank,
            }
        })
        .collect();

    Layout {
        width,
        height,
        nodes,
        back_edges,
        layer_count,
    }
}

/// Length of `count` items of `size` separated by `gap`.
fn span(count: usize, size: f64, gap: f64) -> f64 {
    if count == 0 {
        0.0
    } else {
        count as f64 * size + (count - 1) as f64 * gap
    }
}

/// Iterative DFS from each unvisited node in declaration order; an edge into
/// a node still on the stack is a back edge.  Self-loops always are.
fn find_back_edges(adjacency: &[Vec<(usize, usize)>], edge_count: usize) -> Vec<bool> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    let mut back = vec![false; edge_count];
    let mut marks = vec![Mark::New; adjacency.len()];

    for root in 0..adjacency.len() {
        if marks[root] != Mark::New {
            continue;
        }
        marks[root] = Mark::Active;
        let mut stack = vec![(root, 0usize)];

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            if let Some(&(edge, target)) = adjacency[node].get(frame.1) {
                frame.1 += 1;
                match marks[target] {
                    Mark::Active => back[edge] = true,
                    Mark::New => {
                        marks[target] = Mark::Active;
                        stack.push((target, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                stack.pop();
            }
        }
    }
    back
}

/// Layer of each node: the length of the longest forward path reaching it.
fn longest_path_layers(adjacency: &[Vec<(usize, usize)>], back: &[bool]) -> Vec<usize> {
    let mut indegree = vec![0usize; adjacency.len()];
    for edges in adjacency {
        for &(edge, target) in edges {
            if !back[edge] {
                indegree[target] += 1;
            }
        }
    }

    let mut layers = vec![0usize; adjacency.len()];
    let mut ready: VecDeque<usize> = (0..adjacency.len()).filter(|&n| indegree[n] == 0).collect();
    while let Some(node) = ready.pop_front() {
        for &(edge, target) in &adjacency[node] {
            if back[edge] {
                continue;
            }
            layers[target] = layers[target].max(layers[node] + 1);
            indegree[target] -= 1;
            if indegree[target] == 0 {
                ready.push_back(target);
            }
        }
    }
    layers
}
