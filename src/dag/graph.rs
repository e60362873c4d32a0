// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::dag::task_info::{EdgeKind, TaskInfo};
use crate::engine::TaskName;
use crate::errors::{CrossrunError, Result};

/// Internal node structure: immediate predecessors and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Predecessors with the kind of edge this task has on them.
    deps: Vec<(TaskName, EdgeKind)>,
    /// Tasks that list this one as a predecessor.
    dependents: Vec<TaskName>,
}

/// In-memory task graph keyed by task name.
///
/// Built from the scheduler's task table before every run, after
/// [`DagGraph::validate`] has rejected unknown predecessors and cycles.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: HashMap<TaskName, DagNode>,
}

impl DagGraph {
    /// Build a graph from task metadata.
    ///
    /// A predecessor listed both as hard and as success predecessor yields a
    /// single `Success` edge.
    pub fn from_tasks<'a, I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = &'a TaskInfo>,
    {
        let mut nodes: HashMap<TaskName, DagNode> = HashMap::new();

        for info in tasks {
            let mut deps: Vec<(TaskName, EdgeKind)> = Vec::new();
            for dep in &info.after_success {
                if !deps.iter().any(|(d, _)| d == dep) {
                    deps.push((dep.clone(), EdgeKind::Success));
                }
            }
            for dep in &info.after {
                if !deps.iter().any(|(d, _)| d == dep) {
                    deps.push((dep.clone(), EdgeKind::Completion));
                }
            }
            nodes.entry(info.name.clone()).or_default().deps = deps;
        }

        let edges: Vec<(TaskName, TaskName)> = nodes
            .iter()
            .flat_map(|(name, node)| {
                node.deps
                    .iter()
                    .map(move |(dep, _)| (dep.clone(), name.clone()))
            })
            .collect();

        for (dep, dependent) in edges {
            if let Some(dep_node) = nodes.get_mut(&dep) {
                dep_node.dependents.push(dependent);
            }
        }

        Self { nodes }
    }

    /// Reject predecessors that name no task, and cycles.
    ///
    /// The cycle error lists every task in the offending strongly connected
    /// component, in name order.
    pub fn validate(&self) -> Result<()> {
        let mut names: Vec<&TaskName> = self.nodes.keys().collect();
        names.sort();

        for name in &names {
            for (dep, _) in self.dependencies_of(name) {
                if !self.nodes.contains_key(dep) {
                    return Err(CrossrunError::UnknownDependency {
                        task: name.to_string(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        // Edge direction: dep -> task.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in &names {
            graph.add_node(name.as_str());
        }
        for name in &names {
            for (dep, _) in self.dependencies_of(name) {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        for component in tarjan_scc(&graph) {
            let is_cycle = component.len() > 1
                || component
                    .first()
                    .is_some_and(|n| graph.contains_edge(*n, *n));
            if is_cycle {
                let mut members: Vec<&str> = component;
                members.sort_unstable();
                let mut description = members.join(" -> ");
                if let Some(first) = members.first() {
                    description.push_str(" -> ");
                    description.push_str(first);
                }
                return Err(CrossrunError::TaskCycle(description));
            }
        }

        Ok(())
    }

    /// Immediate predecessors of a task, with edge kinds.
    pub fn dependencies_of(&self, name: &str) -> &[(TaskName, EdgeKind)] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Kind of the edge `dependent` has on `dep`, if any.
    pub fn edge_kind(&self, dependent: &str, dep: &str) -> Option<EdgeKind> {
        self.dependencies_of(dependent)
            .iter()
            .find(|(d, _)| d == dep)
            .map(|(_, kind)| *kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, after: &[&str], after_success: &[&str]) -> TaskInfo {
        TaskInfo::new(
            name.to_string(),
            after.iter().map(|s| s.to_string()).collect(),
            after_success.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn success_edge_wins_over_hard_edge_for_same_predecessor() {
        let tasks = [info("a", &[], &[]), info("b", &["a"], &["a"])];
        let graph = DagGraph::from_tasks(tasks.iter());

        assert_eq!(graph.dependencies_of("b").len(), 1);
        assert_eq!(graph.edge_kind("b", "a"), Some(EdgeKind::Success));
        assert_eq!(graph.dependents_of("a"), &["b".to_string()]);
    }

    #[test]
    fn cycle_error_names_members() {
        let tasks = [
            info("a", &["c"], &[]),
            info("b", &[], &["a"]),
            info("c", &["b"], &[]),
            info("d", &[], &[]),
        ];
        let graph = DagGraph::from_tasks(tasks.iter());

        match graph.validate() {
            Err(CrossrunError::TaskCycle(msg)) => {
                assert_eq!(msg, "a -> b -> c -> a");
            }
            other => panic!("expected TaskCycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let tasks = [info("a", &["a"], &[])];
        let graph = DagGraph::from_tasks(tasks.iter());
        assert!(matches!(graph.validate(), Err(CrossrunError::TaskCycle(_))));
    }

    #[test]
    fn unknown_predecessor_is_rejected() {
        let tasks = [info("a", &[], &["ghost"])];
        let graph = DagGraph::from_tasks(tasks.iter());
        match graph.validate() {
            Err(CrossrunError::UnknownDependency { task, dependency }) => {
                assert_eq!(task, "a");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("expected UnknownDependency, got {other:?}"),
        }
    }
}
