//! Ordering properties of the topological scheduler.

use std::collections::HashSet;

use taskplan::core::{Task, TaskGraph, TaskId};
use taskplan::orchestration::TopologicalScheduler;

use crate::fixtures::{chain_tasks, cyclic_tasks, diamond_tasks, test_task};

fn position(order: &[&Task], id: &str) -> usize {
    order.iter().position(|t| t.id.as_str() == id).unwrap()
}

fn assert_dependencies_first(tasks: &[Task]) {
    let order = TopologicalScheduler::new().order(tasks);
    let present: HashSet<&TaskId> = tasks.iter().map(|t| &t.id).collect();
    for task in tasks {
        for dep in task.dependencies.iter().filter(|d| present.contains(d)) {
            assert!(
                position(&order, dep.as_str()) < position(&order, task.id.as_str()),
                "{} scheduled before its dependency {}",
                task.id,
                dep
            );
        }
    }
}

/// Test: Acyclic graphs respect every present edge
/// Given chain, diamond and a wider layered graph
/// When ordered
/// Then every task follows all of its present dependencies
#[test]
fn test_acyclic_orderings_respect_dependencies() {
    assert_dependencies_first(&chain_tasks());
    assert_dependencies_first(&diamond_tasks());

    let layered: Vec<Task> = (0..6)
        .flat_map(|layer| {
            (0..4).map(move |i| {
                let id = format!("l{}n{}", layer, i);
                let deps: Vec<String> = if layer == 0 {
                    Vec::new()
                } else {
                    vec![format!("l{}n{}", layer - 1, (i + 1) % 4)]
                };
                let refs: Vec<&str> = deps.iter().map(String::as_str).collect();
                test_task(&id, 1.0, &refs).with_priority(((i + layer) % 5 + 1) as i64)
            })
        })
        .collect();
    assert_dependencies_first(&layered);
}

/// Test: Cycles terminate with full coverage
/// Given a project with a two-task cycle
/// When ordered
/// Then every task appears exactly once and the cycle drains by priority
#[test]
fn test_cycle_terminates_with_every_task_once() {
    let tasks = cyclic_tasks();
    let schedule = TopologicalScheduler::new().plan(&tasks);

    assert_eq!(schedule.ordered.len(), tasks.len());
    let unique: HashSet<_> = schedule.ordered.iter().map(|t| &t.id).collect();
    assert_eq!(unique.len(), tasks.len());

    let ids: Vec<&str> = schedule.ordered.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["free", "y", "x"]);
    assert!(schedule.drained());

    let cycles = TaskGraph::from_tasks(&tasks).cycles();
    assert_eq!(cycles.len(), 1);
}

/// Test: Idempotence
/// Given an unmutated task set
/// When ordered twice
/// Then both orderings are identical
#[test]
fn test_ordering_is_idempotent() {
    let mut tasks = diamond_tasks();
    tasks.extend(cyclic_tasks());
    let scheduler = TopologicalScheduler::new();

    let first: Vec<TaskId> = scheduler.order(&tasks).iter().map(|t| t.id.clone()).collect();
    let second: Vec<TaskId> = scheduler.order(&tasks).iter().map(|t| t.id.clone()).collect();
    assert_eq!(first, second);
}

/// Test: Dangling dependencies are satisfied
/// Given a task depending on an id that exists nowhere
/// When ordered
/// Then it is ordered as if it had no dependency, without draining
#[test]
fn test_dangling_dependency_treated_as_satisfied() {
    let tasks = vec![
        test_task("low", 1.0, &[]).with_priority(1),
        test_task("orphan", 1.0, &["deleted-task"]).with_priority(5),
    ];
    let schedule = TopologicalScheduler::new().plan(&tasks);

    assert!(!schedule.drained());
    assert_eq!(schedule.ordered[0].id.as_str(), "orphan");
    assert_eq!(TaskGraph::from_tasks(&tasks).dangling_dependencies().len(), 1);
}

/// Test: Equal priority ties keep input order
#[test]
fn test_equal_priority_is_stable_on_input_order() {
    let tasks: Vec<Task> = ["q", "w", "e", "r"]
        .iter()
        .map(|id| test_task(id, 1.0, &[]).with_priority(3))
        .collect();
    let ids: Vec<&str> = TopologicalScheduler::new()
        .order(&tasks)
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(ids, vec!["q", "w", "e", "r"]);
}
