//! engine::planner
//!
//! Dependency-stage planning for operation graphs.
//!
//! # Architecture
//!
//! The planner transforms a node list into a totally ordered sequence of
//! stages. Nodes within a stage have all dependencies satisfied by
//! earlier stages and may run concurrently; stages run strictly in
//! order.
//!
//! # Invariants
//!
//! - Planning does no I/O and mutates nothing
//! - Every node name is unique
//! - A node's stage index is strictly greater than each dependency's
//! - Stage indices form a gap-free ascending sequence
//! - Declaration order is preserved within a stage
//!
//! # Cycle detection
//!
//! Cycles are found with an iterative white/grey/black depth-first
//! search; recursion is avoided for robustness against large
//! workflows.

use std::collections::HashMap;

use thiserror::Error;

use super::operation::OperationNode;

/// Errors from stage planning.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Two nodes share a step name.
    #[error("duplicate operation name: {0}")]
    DuplicateName(String),

    /// A dependency does not resolve to a declared node.
    #[error("operation {node} depends on unknown operation {dependency}")]
    UnknownDependency {
        /// Node declaring the dependency.
        node: String,
        /// The unresolved reference.
        dependency: String,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle involving: {}", nodes.join(" -> "))]
    Cycle {
        /// Nodes on the detected cycle.
        nodes: Vec<String>,
    },
}

/// A set of nodes whose dependencies are satisfied by earlier stages.
#[derive(Debug, Clone)]
pub struct OperationStage {
    /// Nodes in declaration order.
    pub nodes: Vec<OperationNode>,
}

/// Plan stages from a node list.
///
/// # Errors
///
/// - [`PlanError::DuplicateName`] naming the first duplicate
/// - [`PlanError::UnknownDependency`] naming the first missing reference
/// - [`PlanError::Cycle`] naming the nodes on a cycle
pub fn plan_stages(nodes: &[OperationNode]) -> Result<Vec<OperationStage>, PlanError> {
    let mut index_by_name: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (index, node) in nodes.iter().enumerate() {
        if index_by_name.insert(node.name.as_str(), index).is_some() {
            return Err(PlanError::DuplicateName(node.name.clone()));
        }
    }

    for node in nodes {
        for dependency in &node.dependencies {
            if !index_by_name.contains_key(dependency.as_str()) {
                return Err(PlanError::UnknownDependency {
                    node: node.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    detect_cycle(nodes, &index_by_name)?;

    // Dependencies are acyclic here, so the stage of every node is
    // well-defined: 1 + max(stage of dependencies), 0 for roots.
    let mut stage_of: Vec<Option<usize>> = vec![None; nodes.len()];
    for index in 0..nodes.len() {
        assign_stage(index, nodes, &index_by_name, &mut stage_of);
    }

    let highest = stage_of.iter().flatten().copied().max().unwrap_or(0);
    let mut stages: Vec<OperationStage> = (0..=highest)
        .map(|_| OperationStage { nodes: Vec::new() })
        .collect();
    for (index, node) in nodes.iter().enumerate() {
        if let Some(stage) = stage_of[index] {
            stages[stage].nodes.push(node.clone());
        }
    }
    stages.retain(|stage| !stage.nodes.is_empty());
    Ok(stages)
}

/// Iteratively compute the stage of `start` and everything it reaches.
fn assign_stage(
    start: usize,
    nodes: &[OperationNode],
    index_by_name: &HashMap<&str, usize>,
    stage_of: &mut [Option<usize>],
) {
    let mut pending = vec![start];
    while let Some(&index) = pending.last() {
        if stage_of[index].is_some() {
            pending.pop();
            continue;
        }
        let mut ready = true;
        let mut highest_dependency: Option<usize> = None;
        for dependency in &nodes[index].dependencies {
            let dep_index = index_by_name[dependency.as_str()];
            match stage_of[dep_index] {
                Some(stage) => {
                    highest_dependency = Some(highest_dependency.map_or(stage, |h| h.max(stage)));
                }
                None => {
                    ready = false;
                    pending.push(dep_index);
                }
            }
        }
        if ready {
            stage_of[index] = Some(highest_dependency.map_or(0, |h| h + 1));
            pending.pop();
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Iterative DFS with explicit color marks.
fn detect_cycle(
    nodes: &[OperationNode],
    index_by_name: &HashMap<&str, usize>,
) -> Result<(), PlanError> {
    let mut colors = vec![Color::White; nodes.len()];

    for root in 0..nodes.len() {
        if colors[root] != Color::White {
            continue;
        }
        // Stack entries are (node, next-dependency-offset).
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        colors[root] = Color::Grey;

        while let Some(&mut (index, ref mut offset)) = stack.last_mut() {
            if *offset < nodes[index].dependencies.len() {
                let dependency = &nodes[index].dependencies[*offset];
                *offset += 1;
                let dep_index = index_by_name[dependency.as_str()];
                match colors[dep_index] {
                    Color::White => {
                        colors[dep_index] = Color::Grey;
                        stack.push((dep_index, 0));
                    }
                    Color::Grey => {
                        // Everything grey on the stack from the
                        // re-entered node onward is on the cycle.
                        let mut cycle: Vec<String> = stack
                            .iter()
                            .skip_while(|(i, _)| *i != dep_index)
                            .map(|(i, _)| nodes[*i].name.clone())
                            .collect();
                        cycle.push(nodes[dep_index].name.clone());
                        return Err(PlanError::Cycle { nodes: cycle });
                    }
                    Color::Black => {}
                }
            } else {
                colors[index] = Color::Black;
                stack.pop();
            }
        }
    }
    Ok(())
}
