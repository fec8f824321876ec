// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, warn};

use crate::dag::task::{Task, TaskSpec};
use crate::dag::validate::validate;
use crate::errors::{Result, WavedagError};
use crate::types::TaskId;

/// Validated task graph for one run.
///
/// Tasks are kept in declaration order. Edges run from a dependency to the
/// task that waits on it, so the outgoing neighbours of a node are its
/// dependents. Node `i` of the petgraph graph is task `i`.
///
/// The structure is immutable once built; only the lifecycle fields of each
/// [`Task`] change during a run.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
    graph: DiGraph<usize, ()>,
}

impl TaskGraph {
    /// Validate `specs` and build the graph.
    ///
    /// Returns [`WavedagError::Structural`] with the complete error list if the
    /// set has duplicate ids, unknown dependencies or cycles.
    pub fn build(specs: Vec<TaskSpec>) -> Result<Self> {
        let errors = validate(&specs);
        if !errors.is_empty() {
            return Err(WavedagError::Structural(errors));
        }

        let mut graph = DiGraph::with_capacity(specs.len(), 0);
        let mut index = HashMap::with_capacity(specs.len());

        for (i, spec) in specs.iter().enumerate() {
            graph.add_node(i);
            index.insert(spec.id.clone(), i);
        }

        for (i, spec) in specs.iter().enumerate() {
            for dep in &spec.dependencies {
                if let Some(&d) = index.get(dep) {
                    graph.update_edge(NodeIndex::new(d), NodeIndex::new(i), ());
                }
            }
        }

        debug!(
            tasks = specs.len(),
            edges = graph.edge_count(),
            "built task graph"
        );

        Ok(Self {
            tasks: specs.into_iter().map(Task::new).collect(),
            index,
            graph,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks in declaration order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub(crate) fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        let i = *self.index.get(id)?;
        self.tasks.get_mut(i)
    }

    /// Task ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.id())
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.task(id).map(|t| t.dependencies()).unwrap_or(&[])
    }

    /// Immediate dependents of a task, in declaration order.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        let Some(&i) = self.index.get(id) else {
            return Vec::new();
        };
        let mut dependents: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(i), Direction::Outgoing)
            .map(|n| n.index())
            .collect();
        dependents.sort_unstable();
        dependents.into_iter().map(|d| self.tasks[d].id()).collect()
    }

    /// Tasks with no dependencies.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.tasks
            .iter()
            .filter(|t| t.dependencies().is_empty())
            .map(|t| t.id())
    }

    /// A dependency-respecting order of all task ids.
    pub fn topological_order(&self) -> Vec<&str> {
        match toposort(&self.graph, None) {
            Ok(order) => order.into_iter().map(|n| self.tasks[n.index()].id()).collect(),
            Err(cycle) => {
                // Unreachable for a graph built through `build`.
                warn!(node = cycle.node_id().index(), "cycle in validated graph");
                Vec::new()
            }
        }
    }

    /// Depth of every task: roots are level 0, any other task sits one level
    /// below its deepest dependency. Returned in declaration order.
    pub fn levels(&self) -> Vec<(&str, usize)> {
        let mut level = vec![0usize; self.tasks.len()];
        for id in self.topological_order() {
            let Some(&i) = self.index.get(id) else {
                continue;
            };
            level[i] = self.tasks[i]
                .dependencies()
                .iter()
                .filter_map(|dep| self.index.get(dep))
                .map(|&d| level[d] + 1)
                .max()
                .unwrap_or(0);
        }
        self.tasks
            .iter()
            .zip(level)
            .map(|(t, l)| (t.id(), l))
            .collect()
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}
