//! Final counts and estimates for a simulation run.

use crate::orchestration::engine::SimulationOutcome;
use crate::orchestration::pool::AgentType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Final status of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    /// Queued plus in flight.
    pub remaining_tasks: usize,
    /// 0-100; 0 for an empty project.
    pub completion_rate: f64,
    /// Simulated hours from the first round to the stop.
    pub execution_hours: f64,
    pub rounds: u32,
    /// Live workload per agent type at the stop.
    pub agent_workloads: BTreeMap<AgentType, usize>,
    /// Admissions per agent type over the run.
    pub tasks_assigned: BTreeMap<AgentType, usize>,
    pub success: bool,
    #[serde(default)]
    pub cancelled: bool,
}

/// `completed / total * 100`, defined as 0 when there are no tasks.
pub fn completion_percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}

/// Summarize a finished (or stopped) run.
pub fn summarize(outcome: &SimulationOutcome) -> ExecutionSummary {
    let completed_tasks = outcome.completed.len();
    ExecutionSummary {
        total_tasks: outcome.total_tasks,
        completed_tasks,
        failed_tasks: outcome.failed.len(),
        remaining_tasks: outcome.queued.len() + outcome.in_flight.len(),
        completion_rate: completion_percentage(completed_tasks, outcome.total_tasks),
        execution_hours: outcome.clock_hours,
        rounds: outcome.rounds,
        agent_workloads: outcome.workloads.clone(),
        tasks_assigned: outcome.assignments.clone(),
        success: outcome.success(),
        cancelled: outcome.cancelled,
    }
}

/// Estimated hours of work left.
///
/// Full estimates for queued tasks, plus the non-negative remainder of
/// every in-flight task at the final clock.
pub fn remaining_hours(outcome: &SimulationOutcome) -> f64 {
    let queued: f64 = outcome
        .queued
        .iter()
        .map(|t| t.estimated_hours_or(outcome.default_estimated_hours))
        .sum();
    let in_flight: f64 = outcome
        .in_flight
        .iter()
        .map(|f| f.remaining(outcome.clock_hours))
        .sum();
    queued + in_flight
}
