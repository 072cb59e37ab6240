//! Graph validation — proves a flat step list is a well-formed dependency
//! graph before anything executes.
//!
//! Pipeline: uniqueness → reference completeness → acyclicity →
//! materialization → root extraction. Each stage short-circuits with an
//! aggregated error listing every violation, not just the first. Stages 1–3
//! are fatal for the whole envelope; no step runs on a malformed graph.

use super::types::Step;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// A structural validation failure. Duplicate and unresolved variants carry
/// every offending item found in their stage.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate step ids: {}", .0.join(", "))]
    DuplicateIds(Vec<String>),

    #[error("unresolved requisite references: {}", .0.join(", "))]
    UnresolvedReferences(Vec<String>),

    #[error("requisite cycle detected: {}", format_cycle(.0))]
    Cycle(Vec<String>),
}

/// Render a cycle chain for display. The chain's last member repeats its
/// first, so the rendering reads edge-by-edge back to the start.
pub fn format_cycle(chain: &[String]) -> String {
    chain.join(" -> ")
}

/// A validated step graph. Holds the step list, the id → position map that
/// resolves every requisite reference, and the root set. Read-only after
/// construction; the cook engine never mutates it.
#[derive(Debug)]
pub struct Graph {
    steps: Vec<Step>,
    index: HashMap<String, usize>,
    roots: Vec<usize>,
}

impl Graph {
    /// Validate a flat step list into a graph.
    pub fn validate(steps: Vec<Step>) -> Result<Self, GraphError> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut duplicates: Vec<String> = Vec::new();

        for (pos, step) in steps.iter().enumerate() {
            if index.insert(step.id.clone(), pos).is_some() && !duplicates.contains(&step.id) {
                duplicates.push(step.id.clone());
            }
        }
        if !duplicates.is_empty() {
            return Err(GraphError::DuplicateIds(duplicates));
        }

        let mut unresolved: Vec<String> = Vec::new();
        for step in &steps {
            for requisite in &step.requisites {
                for id in &requisite.step_ids {
                    if !index.contains_key(id) {
                        let entry = format!("'{}' (required by '{}')", id, step.id);
                        if !unresolved.contains(&entry) {
                            unresolved.push(entry);
                        }
                    }
                }
            }
        }
        if !unresolved.is_empty() {
            return Err(GraphError::UnresolvedReferences(unresolved));
        }

        if let Some(chain) = find_cycle(&steps, &index) {
            return Err(GraphError::Cycle(chain));
        }

        // Materialize: flag every step referenced by some other step's
        // requisites, then extract roots (nobody depends on them).
        let mut steps = steps;
        let referenced: HashSet<usize> = steps
            .iter()
            .flat_map(|s| s.requisites.iter())
            .flat_map(|r| r.step_ids.iter())
            .map(|id| index[id])
            .collect();
        for (pos, step) in steps.iter_mut().enumerate() {
            step.is_requisite = referenced.contains(&pos);
        }
        let roots = (0..steps.len())
            .filter(|pos| !steps[*pos].is_requisite)
            .collect();

        Ok(Self { steps, index, roots })
    }

    /// All steps, in submission order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Resolve a step id. Always succeeds for ids named by any requisite in
    /// this graph.
    pub fn get(&self, id: &str) -> Option<&Step> {
        self.index.get(id).map(|pos| &self.steps[*pos])
    }

    /// Steps no other step depends on, in submission order. These are entry
    /// points for tree rendering only — the scheduler starts from whatever
    /// has zero unmet requisites, not from roots.
    pub fn roots(&self) -> Vec<&Step> {
        self.roots.iter().map(|pos| &self.steps[*pos]).collect()
    }

    /// Resolved steps for one requisite group, in declaration order.
    pub fn requisite_steps(&self, step_ids: &[String]) -> Vec<&Step> {
        step_ids
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    OnPath,
    Resolved,
}

/// Depth-first cycle search over requisite edges. Returns the member chain
/// of the first cycle found, closed back onto its starting step.
fn find_cycle(steps: &[Step], index: &HashMap<String, usize>) -> Option<Vec<String>> {
    let mut marks = vec![Mark::Unvisited; steps.len()];
    let mut path: Vec<usize> = Vec::new();

    for start in 0..steps.len() {
        if marks[start] == Mark::Unvisited {
            if let Some(chain) = visit(start, steps, index, &mut marks, &mut path) {
                return Some(chain);
            }
        }
    }
    None
}

fn visit(
    pos: usize,
    steps: &[Step],
    index: &HashMap<String, usize>,
    marks: &mut [Mark],
    path: &mut Vec<usize>,
) -> Option<Vec<String>> {
    marks[pos] = Mark::OnPath;
    path.push(pos);

    for requisite in &steps[pos].requisites {
        for id in &requisite.step_ids {
            let next = index[id];
            match marks[next] {
                Mark::OnPath => {
                    // Revisited a step still on the current path: the cycle
                    // runs from its first occurrence forward to here and
                    // back onto itself.
                    let entry = path.iter().position(|p| *p == next).unwrap_or(0);
                    let mut chain: Vec<String> =
                        path[entry..].iter().map(|p| steps[*p].id.clone()).collect();
                    chain.push(steps[next].id.clone());
                    return Some(chain);
                }
                Mark::Unvisited => {
                    if let Some(chain) = visit(next, steps, index, marks, path) {
                        return Some(chain);
                    }
                }
                Mark::Resolved => {}
            }
        }
    }

    path.pop();
    marks[pos] = Mark::Resolved;
    None
}
