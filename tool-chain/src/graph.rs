//! Dependency graph construction and cycle detection.

use std::collections::{HashMap, VecDeque};

use crate::definition::ChainDefinition;
use crate::error::ChainError;

/// Validated dependency graph over a chain's steps, indexed by declaration
/// position.
#[derive(Debug)]
pub(crate) struct ChainGraph {
    /// Steps that depend on each step, as indices into the step list.
    pub(crate) dependents: Vec<Vec<usize>>,
    /// Number of unfinished dependencies per step.
    pub(crate) in_degree: Vec<usize>,
}

impl ChainGraph {
    /// Builds and validates the graph for a chain.
    ///
    /// Rejects empty chains, duplicate step ids, dependencies on unknown
    /// steps, and cycles (including a step depending on itself).
    pub(crate) fn build(chain: &ChainDefinition) -> Result<Self, ChainError> {
        let steps = chain.steps();
        if steps.is_empty() {
            return Err(ChainError::EmptyChain);
        }

        let mut index = HashMap::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            if index.insert(step.step_id(), position).is_some() {
                return Err(ChainError::DuplicateStep {
                    step: step.step_id().to_owned(),
                });
            }
        }

        let mut dependents = vec![Vec::new(); steps.len()];
        let mut in_degree = vec![0usize; steps.len()];
        for (position, step) in steps.iter().enumerate() {
            for dependency in step.dependencies() {
                let Some(&upstream) = index.get(dependency.as_str()) else {
                    return Err(ChainError::UnknownDependency {
                        step: step.step_id().to_owned(),
                        dependency: dependency.clone(),
                    });
                };
                dependents[upstream].push(position);
                in_degree[position] += 1;
            }
        }

        // Kahn's elimination: anything left with a positive in-degree sits
        // on or behind a cycle.
        let mut remaining = in_degree.clone();
        let mut queue: VecDeque<usize> = remaining
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(position, _)| position)
            .collect();
        let mut processed = 0usize;

        while let Some(position) = queue.pop_front() {
            processed += 1;
            for &dependent in &dependents[position] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if processed < steps.len() {
            let mut stuck: Vec<String> = remaining
                .iter()
                .enumerate()
                .filter(|&(_, &degree)| degree > 0)
                .map(|(position, _)| steps[position].step_id().to_owned())
                .collect();
            stuck.sort();
            return Err(ChainError::CyclicDependency { steps: stuck });
        }

        Ok(Self {
            dependents,
            in_degree,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tool_primitives::ToolId;

    use crate::definition::ChainStep;

    fn step(id: &str, deps: &[&str]) -> ChainStep {
        let mut step = ChainStep::new(id, ToolId::new("echo").unwrap()).unwrap();
        for dep in deps {
            step = step.depends_on(*dep);
        }
        step
    }

    fn chain(steps: Vec<ChainStep>) -> ChainDefinition {
        // Bypass the builder so graph errors surface from `build` directly.
        serde_json::from_value(serde_json::json!({
            "id": "test",
            "name": "test",
            "steps": serde_json::to_value(steps).unwrap(),
        }))
        .unwrap()
    }

    #[test]
    fn diamond_graph_is_accepted() {
        let graph = ChainGraph::build(&chain(vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
        ]))
        .unwrap();

        assert_eq!(graph.in_degree, [0, 1, 1, 2]);
        assert_eq!(graph.dependents[0], [1, 2]);
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert_eq!(
            ChainGraph::build(&chain(Vec::new())).unwrap_err(),
            ChainError::EmptyChain
        );
    }

    #[test]
    fn duplicate_step_is_rejected() {
        let err = ChainGraph::build(&chain(vec![step("a", &[]), step("a", &[])])).unwrap_err();
        assert_eq!(
            err,
            ChainError::DuplicateStep {
                step: "a".to_owned()
            }
        );
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = ChainGraph::build(&chain(vec![step("a", &["ghost"])])).unwrap_err();
        assert!(matches!(err, ChainError::UnknownDependency { dependency, .. } if dependency == "ghost"));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = ChainGraph::build(&chain(vec![step("a", &["a"])])).unwrap_err();
        assert!(matches!(err, ChainError::CyclicDependency { steps } if steps == ["a"]));
    }

    #[test]
    fn transitive_cycle_is_detected() {
        let err = ChainGraph::build(&chain(vec![
            step("a", &["c"]),
            step("b", &["a"]),
            step("c", &["b"]),
            step("free", &[]),
        ]))
        .unwrap_err();

        assert!(matches!(err, ChainError::CyclicDependency { steps } if steps == ["a", "b", "c"]));
    }
}
