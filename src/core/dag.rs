//! Task dependency graph for structural diagnostics.
//!
//! `TaskGraph` is a read-only petgraph view over a set of tasks. Only
//! dependencies between tasks that are present in the set become edges;
//! dependencies on absent ids are recorded separately as dangling.
//!
//! Scheduling itself does not depend on this graph. It is used to explain
//! what the scheduler's drain fallback is about to do and to report graph
//! quality after decomposition.

use crate::core::task::{Task, TaskId};
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap};

/// A dependency reference to an id that no task in the set carries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DanglingDependency {
    /// The task holding the reference.
    pub task: TaskId,
    /// The id it refers to.
    pub missing: TaskId,
}

/// Dependency graph over present task ids.
///
/// Edges point from a dependency to the task that waits on it.
pub struct TaskGraph {
    graph: DiGraph<TaskId, ()>,
    index: HashMap<TaskId, NodeIndex>,
    dangling: Vec<DanglingDependency>,
}

impl TaskGraph {
    /// Build the graph for a set of tasks.
    ///
    /// Duplicate ids keep their first node.
    pub fn from_tasks<'a, I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
        I::IntoIter: Clone,
    {
        let tasks = tasks.into_iter();
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for task in tasks.clone() {
            index
                .entry(task.id.clone())
                .or_insert_with(|| graph.add_node(task.id.clone()));
        }

        let mut dangling = Vec::new();
        for task in tasks {
            let to = index[&task.id];
            for dep in &task.dependencies {
                match index.get(dep) {
                    Some(&from) if from != to => {
                        graph.update_edge(from, to, ());
                    }
                    Some(_) => {}
                    None => dangling.push(DanglingDependency {
                        task: task.id.clone(),
                        missing: dep.clone(),
                    }),
                }
            }
        }
        dangling.sort();

        Self {
            graph,
            index,
            dangling,
        }
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges between present tasks.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    /// Dependency references to ids outside the set, sorted.
    pub fn dangling_dependencies(&self) -> &[DanglingDependency] {
        &self.dangling
    }

    /// Whether the present-id edges contain no cycle.
    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }

    /// Every dependency cycle, as the sorted ids of its strongly connected
    /// component. Components are sorted by their first id.
    pub fn cycles(&self) -> Vec<Vec<TaskId>> {
        let mut cycles: Vec<Vec<TaskId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let ids: BTreeSet<TaskId> = component
                    .into_iter()
                    .map(|idx| self.graph[idx].clone())
                    .collect();
                ids.into_iter().collect()
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Present tasks that `id` waits on.
    pub fn dependencies_of(&self, id: &TaskId) -> Vec<&TaskId> {
        self.neighbors(id, petgraph::Direction::Incoming)
    }

    /// Present tasks that wait on `id`.
    pub fn dependents_of(&self, id: &TaskId) -> Vec<&TaskId> {
        self.neighbors(id, petgraph::Direction::Outgoing)
    }

    fn neighbors(&self, id: &TaskId, dir: petgraph::Direction) -> Vec<&TaskId> {
        let Some(&node) = self.index.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<&TaskId> = self
            .graph
            .neighbors_directed(node, dir)
            .map(|n| &self.graph[n])
            .collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .field("dangling", &self.dangling.len())
            .finish()
    }
}
