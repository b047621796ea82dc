//! Full simulation runs through the service and the engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use taskplan::core::{Project, Task, TaskStatus};
use taskplan::orchestration::{
    AgentPool, AgentSelector, AgentType, EventKind, ExecutionEngine, FinalStatus,
    SimulationConfig, SimulationRequest, SimulationService,
};
use taskplan::store::MemoryProjectStore;

use crate::fixtures::{
    chain_tasks, cyclic_tasks, diamond_tasks, fixed_start, independent_tasks, project_of,
    sim_config, test_task, RecordingProcessor, ScriptedAssignment, SimulationHarness,
};

fn completion_clock(log: &[taskplan::orchestration::ExecutionEvent], id: &str) -> Option<f64> {
    log.iter()
        .find(|e| matches!(&e.kind, EventKind::TaskCompletion { task_id, .. } if task_id.as_str() == id))
        .map(|e| e.clock_hours)
}

/// Test: Two-task dependency scenario
/// Given A (1h) and B (1h, depends on A)
/// When simulated
/// Then B starts only after A completes and the run finishes at 100%
#[tokio::test]
async fn test_dependency_pair_completes_fully() {
    let harness = SimulationHarness::new(Arc::new(ScriptedAssignment::always("developer")));
    let project = project_of(
        "pair",
        vec![test_task("A", 1.0, &[]), test_task("B", 1.0, &["A"])],
    );
    harness.add_project(&project).await;

    let response = harness.simulate("pair", 3).await;

    assert_eq!(response.completion_percentage, 100.0);
    assert_eq!(response.estimated_remaining_hours, 0.0);
    assert_eq!(completion_clock(&response.execution_log, "A"), Some(1.0));
    assert_eq!(completion_clock(&response.execution_log, "B"), Some(2.0));

    let b_start = response
        .execution_log
        .iter()
        .find(|e| matches!(&e.kind, EventKind::TaskStart { task_id, .. } if task_id.as_str() == "B"))
        .unwrap();
    assert_eq!(b_start.clock_hours, 1.0);

    let summary = response.final_status.summary().unwrap();
    assert!(summary.success);
    assert_eq!(summary.total_tasks, 2);
    assert_eq!(summary.remaining_tasks, 0);
}

/// Test: Serial capacity
/// Given capacity 1 and three independent 1h tasks routed to one agent type
/// When simulated
/// Then they complete one after another, one hour apart
#[tokio::test]
async fn test_serial_capacity_three_tasks() {
    let harness = SimulationHarness::new(Arc::new(ScriptedAssignment::always("tester")));
    harness.add_project(&project_of("serial", independent_tasks(3))).await;

    let response = harness.simulate("serial", 1).await;

    let clocks: Vec<f64> = ["t0", "t1", "t2"]
        .iter()
        .map(|id| completion_clock(&response.execution_log, id).unwrap())
        .collect();
    assert_eq!(clocks, vec![1.0, 2.0, 3.0]);

    let summary = response.final_status.summary().unwrap();
    assert_eq!(summary.tasks_assigned.get(&AgentType::Tester), Some(&3));
    assert_eq!(summary.rounds, 7);
}

/// Test: Empty project
/// Given a project with no tasks
/// When simulated
/// Then completion is 0% (not NaN) and nothing remains
#[tokio::test]
async fn test_empty_project() {
    let harness = SimulationHarness::new(Arc::new(ScriptedAssignment::always("developer")));
    harness.add_project(&Project::new("empty", "Empty", "")).await;

    let response = harness.simulate("empty", 3).await;

    assert_eq!(response.completion_percentage, 0.0);
    assert!(!response.completion_percentage.is_nan());
    assert_eq!(response.estimated_remaining_hours, 0.0);
    assert!(response.execution_log.is_empty());
    assert!(response.final_status.summary().unwrap().success);
}

/// Test: Project not found
/// Given an empty store
/// When a simulation is requested
/// Then the response carries an error and no log
#[tokio::test]
async fn test_unknown_project_returns_error_status() {
    let harness = SimulationHarness::new(Arc::new(ScriptedAssignment::always("developer")));

    let response = harness.simulate("ghost", 3).await;

    assert!(matches!(response.final_status, FinalStatus::Error { .. }));
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["final_status"]["error"], "Project not found: ghost");
    assert_eq!(json["execution_log"].as_array().unwrap().len(), 0);
}

/// Test: Accounting and capacity invariants
/// Given a mixed project under tight capacity
/// When run through the engine
/// Then every round accounts for every task and no agent exceeds capacity
#[tokio::test]
async fn test_round_invariants_hold() {
    let mut tasks = diamond_tasks();
    tasks.extend(independent_tasks(5));
    tasks.push(test_task("late", 2.5, &["d", "t4"]));
    let total = tasks.len();

    let oracle = ScriptedAssignment::always("developer")
        .answer("Task b", "tester")
        .answer("Task t1", "tester")
        .answer("Task t3", "reviewer");
    let engine = ExecutionEngine::new(
        sim_config(),
        AgentSelector::new(Arc::new(oracle)),
        AgentPool::standard(2),
    )
    .unwrap();

    let outcome = engine.run(tasks, &CancellationToken::new()).await;

    assert!(outcome.success());
    assert_eq!(outcome.completed.len(), total);
    for snapshot in &outcome.snapshots {
        assert_eq!(snapshot.accounted(), total, "round {}", snapshot.round);
        assert!(snapshot.workloads.values().all(|w| *w <= 2), "round {}", snapshot.round);
    }
    assert!(outcome.workloads.values().all(|w| *w == 0));
}

/// Test: Cycle in the project
/// Given x <-> y
/// When simulated
/// Then the free task completes and the cycle stays queued until the round cap
#[tokio::test]
async fn test_cycle_hits_round_cap_with_partial_results() {
    let config = SimulationConfig::default()
        .with_start_time(fixed_start())
        .with_max_rounds(12);
    let harness =
        SimulationHarness::with_config(Arc::new(ScriptedAssignment::always("developer")), config);
    harness.add_project(&project_of("cyclic", cyclic_tasks())).await;

    let response = harness.simulate("cyclic", 3).await;

    let summary = response.final_status.summary().unwrap();
    assert!(!summary.success);
    assert_eq!(summary.rounds, 12);
    assert_eq!(summary.completed_tasks, 1);
    assert_eq!(summary.remaining_tasks, 2);
    assert!((response.completion_percentage - 100.0 / 3.0).abs() < 1e-9);
    assert_eq!(response.estimated_remaining_hours, 2.0);
}

/// Test: Oracle failure degrades to Developer
/// Given an assignment oracle that fails for one task
/// When simulated
/// Then an error event is logged, the task runs on Developer, and the run succeeds
#[tokio::test]
async fn test_assignment_failure_is_logged_and_defaulted() {
    let oracle = ScriptedAssignment::always("analyzer").fail_on("Task b");
    let harness = SimulationHarness::new(Arc::new(oracle));
    harness.add_project(&project_of("chain", chain_tasks())).await;

    let response = harness.simulate("chain", 3).await;

    let errors: Vec<&str> = response
        .execution_log
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::Error { message } => Some(message.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("b"));

    let b_agent = response
        .execution_log
        .iter()
        .find_map(|e| match &e.kind {
            EventKind::TaskStart {
                task_id, agent_type, ..
            } if task_id.as_str() == "b" => Some(*agent_type),
            _ => None,
        });
    assert_eq!(b_agent, Some(AgentType::Developer));
    assert_eq!(response.completion_percentage, 100.0);
}

/// Test: Unrecognised suggestion is not an error
#[tokio::test]
async fn test_unknown_agent_suggestion_defaults_silently() {
    let harness = SimulationHarness::new(Arc::new(ScriptedAssignment::always("wizard")));
    harness.add_project(&project_of("one", independent_tasks(1))).await;

    let response = harness.simulate("one", 3).await;

    assert!(response.execution_log.iter().all(|e| !e.is_error()));
    let summary = response.final_status.summary().unwrap();
    assert_eq!(summary.tasks_assigned, BTreeMap::from([(AgentType::Developer, 1)]));
}

/// Test: Pre-finished tasks
/// Given a project with one Completed and one Cancelled task
/// When simulated
/// Then they are counted without being re-run
#[tokio::test]
async fn test_completed_and_cancelled_tasks_are_not_rerun() {
    let mut done = test_task("done", 3.0, &[]);
    done.status = TaskStatus::Completed;
    let mut dropped = test_task("dropped", 3.0, &[]);
    dropped.status = TaskStatus::Cancelled;
    let after = test_task("after", 1.0, &["done"]);

    let harness = SimulationHarness::new(Arc::new(ScriptedAssignment::always("developer")));
    harness.add_project(&project_of("mixed", vec![done, dropped, after])).await;

    let response = harness.simulate("mixed", 3).await;

    let summary = response.final_status.summary().unwrap();
    assert_eq!(summary.completed_tasks, 2);
    assert_eq!(summary.failed_tasks, 1);
    assert_eq!(summary.remaining_tasks, 0);
    assert!(summary.success);
    let started: Vec<&str> = response
        .execution_log
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::TaskStart { task_id, .. } => Some(task_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec!["after"]);
}

/// Test: Cancellation
/// Given a token that is already cancelled
/// When simulated
/// Then partial results come back marked as unsuccessful
#[tokio::test]
async fn test_cancellation_returns_partial_results() {
    let store = Arc::new(MemoryProjectStore::new());
    let service = SimulationService::new(
        store.clone(),
        Arc::new(ScriptedAssignment::always("developer")),
        sim_config(),
    )
    .unwrap();
    taskplan::store::ProjectStore::save(store.as_ref(), &project_of("long", chain_tasks()))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let response = service.simulate(&SimulationRequest::new("long"), &cancel).await;

    let summary = response.final_status.summary().unwrap();
    assert!(summary.cancelled);
    assert!(!summary.success);
    assert_eq!(summary.remaining_tasks, 3);
    assert_eq!(response.estimated_remaining_hours, 3.0);
}

/// Test: Processor output is logged
#[tokio::test]
async fn test_processing_events_follow_starts() {
    let store = Arc::new(MemoryProjectStore::new());
    let service = SimulationService::new(
        store.clone(),
        Arc::new(ScriptedAssignment::always("reviewer")),
        sim_config(),
    )
    .unwrap()
    .with_processor(Arc::new(RecordingProcessor));
    taskplan::store::ProjectStore::save(store.as_ref(), &project_of("p", independent_tasks(2)))
        .await
        .unwrap();

    let response = service
        .simulate(&SimulationRequest::new("p"), &CancellationToken::new())
        .await;

    let kinds: Vec<&str> = response
        .execution_log
        .iter()
        .take(5)
        .map(|e| e.kind.name())
        .collect();
    assert_eq!(
        kinds,
        vec!["state", "task_start", "task_processing", "task_start", "task_processing"]
    );
}

/// Test: Determinism
/// Given the same project and scripted oracle
/// When simulated twice
/// Then the execution logs are identical
#[tokio::test]
async fn test_execution_log_is_deterministic() {
    let mut tasks = diamond_tasks();
    tasks.extend(independent_tasks(4));

    let first = simulate_fresh(&tasks).await;
    let second = simulate_fresh(&tasks).await;
    assert_eq!(first.execution_log, second.execution_log);
    assert_eq!(first.execution_log[0].timestamp, fixed_start());
}

async fn simulate_fresh(tasks: &[Task]) -> taskplan::orchestration::SimulationResponse {
    let harness = SimulationHarness::new(Arc::new(
        ScriptedAssignment::always("developer").answer("Task t2", "tester"),
    ));
    harness.add_project(&project_of("det", tasks.to_vec())).await;
    harness.simulate("det", 2).await
}
