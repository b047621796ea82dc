//! Topological scheduler.
//!
//! Produces an execution-ready ordering of a task set: every task comes
//! after the dependencies it has inside the set, and among tasks that are
//! ready at the same time the higher priority goes first. Ties on priority
//! keep the input order, so the same input always yields the same ordering.
//!
//! Dependencies on ids outside the set are dangling and count as already
//! satisfied. When tasks remain but none is ready (a cycle among present
//! ids), all remaining tasks are drained in one shot, sorted by descending
//! priority with input order as tie-break, without further dependency
//! checks. This guarantees termination and full coverage.
//!
//! The scheduler never mutates tasks.

use crate::core::{Priority, Task, TaskGraph, TaskId};
use crate::{tplog_debug, tplog_warn};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// An ordering plus how it was reached.
#[derive(Debug, Clone)]
pub struct Schedule<'a> {
    /// Every input task exactly once.
    pub ordered: Vec<&'a Task>,
    /// Index into `ordered` where the drain fallback took over, if it did.
    pub drain_from: Option<usize>,
}

impl<'a> Schedule<'a> {
    /// Whether the drain fallback was needed.
    pub fn drained(&self) -> bool {
        self.drain_from.is_some()
    }

    /// Tasks placed by the drain fallback.
    pub fn drained_tasks(&self) -> &[&'a Task] {
        match self.drain_from {
            Some(i) => &self.ordered[i..],
            None => &[],
        }
    }

    pub fn ids(&self) -> Vec<&'a TaskId> {
        self.ordered.iter().map(|t| &t.id).collect()
    }

    /// Owned copies of the tasks in order.
    pub fn to_tasks(&self) -> Vec<Task> {
        self.ordered.iter().map(|t| (*t).clone()).collect()
    }
}

/// Orders tasks by dependency and priority.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologicalScheduler;

impl TopologicalScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Order `tasks`. See the module docs for the exact rules.
    pub fn order<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        self.plan(tasks).ordered
    }

    /// Order `tasks` and report whether the drain fallback was used.
    pub fn plan<'a>(&self, tasks: &'a [Task]) -> Schedule<'a> {
        // First occurrence wins if ids repeat.
        let mut position: HashMap<&TaskId, usize> = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            position.entry(&task.id).or_insert(i);
        }

        let mut waiting_on = vec![0usize; tasks.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
        for (i, task) in tasks.iter().enumerate() {
            for dep in &task.dependencies {
                if let Some(&d) = position.get(dep) {
                    if d != i {
                        waiting_on[i] += 1;
                        dependents[d].push(i);
                    }
                }
            }
        }

        // Max-heap on (priority, earliest input index).
        let mut ready: BinaryHeap<(Priority, Reverse<usize>)> = tasks
            .iter()
            .enumerate()
            .filter(|(i, _)| waiting_on[*i] == 0)
            .map(|(i, t)| (t.priority, Reverse(i)))
            .collect();

        let mut placed = vec![false; tasks.len()];
        let mut ordered = Vec::with_capacity(tasks.len());

        while let Some((_, Reverse(i))) = ready.pop() {
            placed[i] = true;
            ordered.push(&tasks[i]);
            for &j in &dependents[i] {
                waiting_on[j] -= 1;
                if waiting_on[j] == 0 {
                    ready.push((tasks[j].priority, Reverse(j)));
                }
            }
        }

        let mut drain_from = None;
        if ordered.len() < tasks.len() {
            drain_from = Some(ordered.len());
            let mut remaining: Vec<(usize, &Task)> = tasks
                .iter()
                .enumerate()
                .filter(|(i, _)| !placed[*i])
                .collect();
            remaining.sort_by_key(|(i, t)| (Reverse(t.priority), *i));

            let cycles = TaskGraph::from_tasks(tasks).cycles();
            tplog_warn!(
                "Scheduler drain fallback: {} of {} tasks unorderable, cycles: {:?}",
                remaining.len(),
                tasks.len(),
                cycles
            );
            ordered.extend(remaining.into_iter().map(|(_, t)| t));
        }

        tplog_debug!(
            "Scheduled {} tasks (drain_from={:?})",
            ordered.len(),
            drain_from
        );

        Schedule {
            ordered,
            drain_from,
        }
    }
}
