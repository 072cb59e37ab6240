//! Tree rendering — human-readable view of a validated graph.
//!
//! Pure function of the graph: each root and its requisite subtree as
//! indented ASCII, depth-first, preserving requisite-group and within-group
//! ordering. Diagnostics only; output is byte-for-byte deterministic for
//! identical input ordering.

use super::graph::Graph;
use super::types::Step;

/// Render every root's subtree.
pub fn render(graph: &Graph) -> String {
    let mut out = String::new();
    for root in graph.roots() {
        out.push_str(&root.id);
        out.push('\n');
        render_children(graph, root, 1, &mut out);
        out.push_str("\n\n");
    }
    out
}

fn render_children(graph: &Graph, step: &Step, depth: usize, out: &mut String) {
    let children: Vec<&String> = step
        .requisites
        .iter()
        .flat_map(|r| r.step_ids.iter())
        .collect();

    for (pos, id) in children.iter().enumerate() {
        for _ in 0..depth {
            out.push_str("|\t");
        }
        if pos + 1 == children.len() {
            out.push_str("└── ");
        } else {
            out.push_str("├── ");
        }
        out.push_str(id);
        out.push('\n');

        // Post-validation every id resolves; a miss just ends the branch.
        if let Some(child) = graph.get(id) {
            render_children(graph, child, depth + 1, out);
        }
    }
}
