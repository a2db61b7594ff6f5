// Dependency resolution between pipeline steps
// Author: Gabriel Demetrios Lafis

use std::collections::{BTreeSet, HashSet};

use thiserror::Error;

use super::{Step, TransformStepInput};
use crate::utils::{config_str, referenced_sources};

/// The dependency-relevant view of a step
#[derive(Debug, Clone, PartialEq)]
pub struct StepNode {
    pub id: String,
    pub order: i64,
    pub sources: Vec<String>,
    pub output: Option<String>,
    pub depends_on: Vec<String>,
}

impl StepNode {
    pub fn from_step(step: &Step) -> Self {
        StepNode {
            id: step.id.clone(),
            order: step.order,
            sources: step.sources().into_iter().map(str::to_string).collect(),
            output: Some(step.output().to_string()),
            depends_on: step.depends_on.clone(),
        }
    }

    /// Node of an unparsed step; a missing id becomes `#<index>`
    pub fn from_input(index: usize, input: &TransformStepInput) -> Self {
        StepNode {
            id: input.id.clone().unwrap_or_else(|| format!("#{}", index)),
            order: input.order,
            sources: referenced_sources(&input.config),
            output: config_str(&input.config, "output").map(str::to_string),
            depends_on: input.depends_on.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cyclic dependency between steps: {}", step_ids.join(", "))]
pub struct CyclicDependencyError {
    pub step_ids: Vec<String>,
}

/// Direct predecessors of every node, by index.
///
/// `A -> B` when B reads A's output or lists A's id in `dependsOn`. A step
/// reading its own output name reads the stored collection, not itself, but
/// a step listing its own id in `dependsOn` is a cycle.
pub fn predecessors(nodes: &[StepNode]) -> Vec<BTreeSet<usize>> {
    nodes
        .iter()
        .enumerate()
        .map(|(b, node)| {
            let mut preds = BTreeSet::new();

            for (a, other) in nodes.iter().enumerate() {
                let listed = node.depends_on.iter().any(|d| *d == other.id);

                if a == b {
                    if listed {
                        preds.insert(a);
                    }
                    continue;
                }

                let feeds = other
                    .output
                    .as_ref()
                    .map_or(false, |out| node.sources.iter().any(|s| s == out));

                if feeds || listed {
                    preds.insert(a);
                }
            }

            preds
        })
        .collect()
}

/// Stable topological order of `nodes`, as indexes.
///
/// Among ready nodes the lowest `order` runs first, ties broken by position.
pub fn resolve_order(nodes: &[StepNode]) -> Result<Vec<usize>, CyclicDependencyError> {
    let preds = predecessors(nodes);
    let mut done = vec![false; nodes.len()];
    let mut ordered = Vec::with_capacity(nodes.len());

    while ordered.len() < nodes.len() {
        let next = (0..nodes.len())
            .filter(|&i| !done[i] && preds[i].iter().all(|&p| done[p]))
            .min_by_key(|&i| (nodes[i].order, i));

        match next {
            Some(i) => {
                done[i] = true;
                ordered.push(i);
            }
            None => {
                let step_ids = (0..nodes.len())
                    .filter(|&i| !done[i])
                    .map(|i| nodes[i].id.clone())
                    .collect();
                return Err(CyclicDependencyError { step_ids });
            }
        }
    }

    Ok(ordered)
}

/// Every node that transitively depends on `index`
pub fn dependents(nodes: &[StepNode], index: usize) -> HashSet<usize> {
    let preds = predecessors(nodes);
    let mut reached = HashSet::new();
    let mut frontier = vec![index];

    while let Some(current) = frontier.pop() {
        for (i, p) in preds.iter().enumerate() {
            if p.contains(&current) && reached.insert(i) {
                frontier.push(i);
            }
        }
    }

    reached.remove(&index);
    reached
}
