//! Target dependency graph.
//!
//! Nodes keep the order in which targets were added; that order drives the
//! order of statements in the root Ninja file. Ninja schedules the build
//! itself, so no topological sort happens here, but the graph is checked for
//! unknown dependencies and cycles before assembly starts.
//!
//! # Examples
//!
//! ```
//! use ninjaweave::graph::TargetGraph;
//!
//! let mut graph = TargetGraph::new();
//! graph.add_target("Lib");
//! graph.add_target("App");
//! graph.add_dependency("App", "Lib");
//! assert!(graph.validate().is_ok());
//! assert_eq!(graph.dependencies("App").collect::<Vec<_>>(), ["Lib"]);
//! ```

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use thiserror::Error;

/// Problems found while validating a [`TargetGraph`].
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum TargetGraphError {
    /// A target depends on a name that is not part of the graph.
    #[error("target '{dependent}' depends on unknown target '{dependency}'")]
    #[diagnostic(code(ninjaweave::graph::unknown_dependency))]
    UnknownDependency {
        /// Target declaring the dependency.
        dependent: String,
        /// Name that could not be found.
        dependency: String,
    },
    /// The dependency edges form a cycle.
    #[error("target dependency cycle: {}", .cycle.join(" -> "))]
    #[diagnostic(
        code(ninjaweave::graph::cycle),
        help("remove one of the dependencies so targets can build in order")
    )]
    Cycle {
        /// Targets on the cycle, starting and ending with the same name.
        cycle: Vec<String>,
    },
}

/// Targets and their direct dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetGraph {
    nodes: IndexMap<String, IndexSet<String>>,
}

impl TargetGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target; adding an existing name keeps its position.
    pub fn add_target(&mut self, name: impl Into<String>) {
        self.nodes.entry(name.into()).or_default();
    }

    /// Record that `dependent` must build after `dependency`.
    pub fn add_dependency(&mut self, dependent: impl Into<String>, dependency: impl Into<String>) {
        self.nodes
            .entry(dependent.into())
            .or_default()
            .insert(dependency.into());
    }

    /// Target names in insertion order.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Direct dependencies of `target`, in declaration order.
    pub fn dependencies(&self, target: &str) -> impl Iterator<Item = &str> {
        self.nodes
            .get(target)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    /// Whether `target` is part of the graph.
    #[must_use]
    pub fn contains(&self, target: &str) -> bool {
        self.nodes.contains_key(target)
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check every dependency names a known target and the graph is acyclic.
    ///
    /// # Errors
    ///
    /// Returns [`TargetGraphError::UnknownDependency`] for the first dangling
    /// edge, or [`TargetGraphError::Cycle`] with the canonical cycle.
    pub fn validate(&self) -> Result<(), TargetGraphError> {
        for (dependent, deps) in &self.nodes {
            if let Some(dependency) = deps.iter().find(|dep| !self.nodes.contains_key(*dep)) {
                return Err(TargetGraphError::UnknownDependency {
                    dependent: dependent.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        let mut detector = CycleDetector::new(self);
        for node in self.nodes.keys() {
            if let Some(cycle) = detector.visit(node) {
                return Err(TargetGraphError::Cycle { cycle });
            }
        }
        Ok(())
    }
}

/// Tracks the visitation state of a node during cycle detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VisitState {
    Visiting,
    Visited,
}

struct CycleDetector<'a> {
    graph: &'a TargetGraph,
    stack: Vec<&'a str>,
    states: HashMap<&'a str, VisitState>,
}

impl<'a> CycleDetector<'a> {
    fn new(graph: &'a TargetGraph) -> Self {
        Self {
            graph,
            stack: Vec::new(),
            states: HashMap::new(),
        }
    }

    fn visit(&mut self, node: &'a str) -> Option<Vec<String>> {
        match self.states.get(node) {
            Some(VisitState::Visited) => return None,
            Some(VisitState::Visiting) => {
                let idx = self.stack.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<String> = self
                    .stack
                    .iter()
                    .skip(idx)
                    .map(|n| (*n).to_owned())
                    .collect();
                cycle.push(node.to_owned());
                return Some(canonicalize_cycle(cycle));
            }
            None => {
                self.states.insert(node, VisitState::Visiting);
            }
        }
        self.stack.push(node);

        if let Some(deps) = self.graph.nodes.get(node) {
            for dep in deps {
                if let Some(cycle) = self.visit(dep) {
                    return Some(cycle);
                }
            }
        }

        self.stack.pop();
        self.states.insert(node, VisitState::Visited);
        None
    }
}

/// Rotate a closed cycle so it starts at its smallest name.
fn canonicalize_cycle(mut cycle: Vec<String>) -> Vec<String> {
    if cycle.len() < 2 {
        return cycle;
    }
    let len = cycle.len() - 1;
    let start = cycle
        .iter()
        .take(len)
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    let (prefix, suffix) = cycle.split_at_mut(len);
    prefix.rotate_left(start);
    if let (Some(first), Some(slot)) = (prefix.first().cloned(), suffix.first_mut()) {
        *slot = first;
    }
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> TargetGraph {
        let mut graph = TargetGraph::new();
        for (dependent, dependency) in edges {
            graph.add_target(*dependency);
            graph.add_dependency(*dependent, *dependency);
        }
        graph
    }

    #[test]
    fn targets_keep_insertion_order() {
        let mut graph = TargetGraph::new();
        graph.add_target("b");
        graph.add_target("a");
        graph.add_target("b");
        assert_eq!(graph.targets().collect::<Vec<_>>(), ["b", "a"]);
    }

    #[test]
    fn unknown_dependencies_are_rejected() {
        let mut graph = TargetGraph::new();
        graph.add_dependency("App", "Missing");
        assert_eq!(
            graph.validate(),
            Err(TargetGraphError::UnknownDependency {
                dependent: "App".into(),
                dependency: "Missing".into(),
            })
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let graph = graph(&[("a", "a")]);
        assert_eq!(
            graph.validate(),
            Err(TargetGraphError::Cycle {
                cycle: vec!["a".into(), "a".into()],
            })
        );
    }

    #[test]
    fn cycles_are_reported_canonically() {
        let graph = graph(&[("c", "a"), ("a", "b"), ("b", "c")]);
        let Err(TargetGraphError::Cycle { cycle }) = graph.validate() else {
            panic!("expected a cycle");
        };
        assert_eq!(cycle, ["a", "b", "c", "a"]);
    }

    #[test]
    fn diamond_is_acyclic() {
        let graph = graph(&[("app", "left"), ("app", "right"), ("left", "base"), ("right", "base")]);
        assert!(graph.validate().is_ok());
        assert_eq!(graph.dependencies("app").collect::<Vec<_>>(), ["left", "right"]);
        assert_eq!(graph.dependencies("missing").count(), 0);
    }

    #[test]
    fn canonicalize_cycle_rotates_smallest_node() {
        let cycle = vec!["c".to_owned(), "a".into(), "b".into(), "c".into()];
        assert_eq!(canonicalize_cycle(cycle), ["a", "b", "c", "a"]);
    }
}
