//! Decomposition of a request into a project, then simulation of the result.

use std::sync::Arc;

use taskplan::core::{TaskId, TaskStatus};
use taskplan::orchestration::{
    AgentSelector, AgentType, CategoryRouter, DecompositionRequest, Decomposer,
};

use crate::fixtures::{proposal, ScriptedDecomposition, SimulationHarness};

fn login_oracle() -> ScriptedDecomposition {
    ScriptedDecomposition::new()
        .split(
            "Main Feature Request",
            vec![
                proposal("design", "Design auth flow", 3.0, "design", &[]),
                proposal("backend", "Build login API", 8.0, "development", &["design"]),
                proposal("qa", "Test login", 2.0, "testing", &["backend", "sso-provider"]),
            ],
        )
        .split(
            "Build login API",
            vec![
                proposal("endpoint", "Write endpoint", 4.0, "implementation", &[]),
                proposal("sessions", "Session storage", 5.0, "implementation", &["endpoint"]),
            ],
        )
}

fn decomposer(oracle: ScriptedDecomposition) -> Decomposer {
    Decomposer::new(
        Arc::new(oracle),
        AgentSelector::new(Arc::new(CategoryRouter::default())),
    )
}

/// Test: Layered decomposition
/// Given an oracle that splits the root and one of its children
/// When a request is decomposed with depth 3
/// Then subtasks are appended under their parents and split parents are completed
#[tokio::test]
async fn test_layered_decomposition() {
    let response = decomposer(login_oracle())
        .decompose(&DecompositionRequest::new("Add login with SSO").with_context("Rust web service"))
        .await
        .unwrap();

    let project = &response.project;
    assert_eq!(project.task_count(), 6);
    assert_eq!(response.tasks_created(), 5);
    assert_eq!(response.layers.len(), 3);
    assert_eq!(response.layers[0].subtasks_created, 3);
    assert_eq!(response.layers[1].subtasks_created, 2);
    assert_eq!(response.layers[2].subtasks_created, 0);
    assert_eq!(
        response.summary,
        "Decomposition completed with 5 tasks created across 3 layers."
    );

    let backend = project.get_task(&TaskId::new("backend")).unwrap();
    assert_eq!(backend.status, TaskStatus::Completed);
    assert_eq!(backend.subtasks.len(), 2);
    let sessions = project.get_task(&TaskId::new("sessions")).unwrap();
    assert_eq!(sessions.parent_task, Some(TaskId::new("backend")));
    assert_eq!(sessions.status, TaskStatus::Pending);

    // "sso-provider" is not part of the project.
    assert_eq!(response.quality.dangling_dependencies, 1);
    assert_eq!(response.quality.cycles, 0);
    assert_eq!(response.quality.description_coverage, 100.0);
}

/// Test: Execution plan
/// Given a decomposed project
/// When the plan is built
/// Then steps follow dependency order and carry routed agents
#[tokio::test]
async fn test_execution_plan_order_and_agents() {
    let response = decomposer(login_oracle())
        .decompose(&DecompositionRequest::new("Add login with SSO"))
        .await
        .unwrap();

    let plan = &response.execution_plan;
    assert_eq!(plan.len(), 6);
    assert!(plan.iter().enumerate().all(|(i, s)| s.step == i + 1));

    let step_of = |id: &str| plan.iter().find(|s| s.task_id.as_str() == id).unwrap();
    assert!(step_of("design").step < step_of("backend").step);
    assert!(step_of("endpoint").step < step_of("sessions").step);
    assert_eq!(step_of("design").suggested_agent, AgentType::Analyzer);
    assert_eq!(step_of("qa").suggested_agent, AgentType::Tester);
    assert_eq!(step_of("sessions").suggested_agent, AgentType::Developer);
}

/// Test: Oracle failure in a layer
/// Given an oracle that fails on one child
/// When decomposed
/// Then the failure is noted and the other subtasks are still created
#[tokio::test]
async fn test_failed_split_is_recorded() {
    let oracle = login_oracle().fail_on("Build login API");
    let response = decomposer(oracle)
        .decompose(&DecompositionRequest::new("Add login with SSO"))
        .await
        .unwrap();

    assert_eq!(response.project.task_count(), 4);
    assert_eq!(response.layers[1].errors.len(), 1);
    let backend = response.project.get_task(&TaskId::new("backend")).unwrap();
    assert_eq!(backend.status, TaskStatus::Pending);
}

/// Test: Depth limit
#[tokio::test]
async fn test_depth_one_only_splits_root() {
    let response = decomposer(login_oracle())
        .decompose(&DecompositionRequest::new("Add login with SSO").with_max_depth(1))
        .await
        .unwrap();

    assert_eq!(response.project.task_count(), 4);
    assert_eq!(response.layers.len(), 1);
}

/// Test: Decompose then simulate
/// Given a decomposed project in the store
/// When simulated
/// Then split parents count as completed and every leaf runs
#[tokio::test]
async fn test_decomposed_project_simulates_to_completion() {
    let response = decomposer(login_oracle())
        .decompose(&DecompositionRequest::new("Add login with SSO"))
        .await
        .unwrap();
    let project = response.project;
    let id = project.id.to_string();

    let harness = SimulationHarness::new(Arc::new(CategoryRouter::default()));
    harness.add_project(&project).await;
    let simulated = harness.simulate(&id, 3).await;

    let summary = simulated.final_status.summary().unwrap();
    assert!(summary.success);
    assert_eq!(summary.total_tasks, 6);
    assert_eq!(summary.completed_tasks, 6);
    assert_eq!(simulated.completion_percentage, 100.0);
    // Root and "backend" were split, so four leaves were admitted.
    assert_eq!(summary.tasks_assigned.values().sum::<usize>(), 4);
}
