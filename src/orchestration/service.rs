//! Simulation request handling.
//!
//! Loads a project, runs the engine and packages the result. A request
//! never fails outright: a missing project or a broken store produces a
//! response whose final status carries the error.

use crate::core::{Project, ProjectId};
use crate::error::{Error, Result};
use crate::orchestration::assignment::AgentSelector;
use crate::orchestration::engine::{ExecutionEngine, SimulationConfig, SimulationOutcome};
use crate::orchestration::events::ExecutionEvent;
use crate::orchestration::metrics::{self, ExecutionSummary};
use crate::orchestration::oracle::{AssignmentOracle, TaskProcessor};
use crate::orchestration::pool::{AgentPool, DEFAULT_AGENT_CAPACITY};
use crate::store::ProjectStore;
use crate::{tplog, tplog_error, tplog_warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Bounds for the per-agent concurrency a request may ask for.
pub const MIN_AGENT_CAPACITY: usize = 1;
pub const MAX_AGENT_CAPACITY: usize = 10;

fn default_simulation_mode() -> bool {
    true
}

fn default_capacity() -> usize {
    DEFAULT_AGENT_CAPACITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub project_id: ProjectId,
    /// `false` asks for real execution, which runs the simulation anyway.
    #[serde(default = "default_simulation_mode")]
    pub simulation_mode: bool,
    /// Clamped to 1-10.
    #[serde(default = "default_capacity")]
    pub max_concurrent_tasks_per_agent: usize,
}

impl SimulationRequest {
    pub fn new(project_id: impl Into<ProjectId>) -> Self {
        Self {
            project_id: project_id.into(),
            simulation_mode: true,
            max_concurrent_tasks_per_agent: DEFAULT_AGENT_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.max_concurrent_tasks_per_agent = capacity;
        self
    }

    pub fn capacity(&self) -> usize {
        self.max_concurrent_tasks_per_agent
            .clamp(MIN_AGENT_CAPACITY, MAX_AGENT_CAPACITY)
    }
}

/// Summary on success, an error message otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FinalStatus {
    Summary(ExecutionSummary),
    Error { error: String },
}

impl FinalStatus {
    pub fn summary(&self) -> Option<&ExecutionSummary> {
        match self {
            FinalStatus::Summary(s) => Some(s),
            FinalStatus::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FinalStatus::Error { error } => Some(error),
            FinalStatus::Summary(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResponse {
    pub execution_log: Vec<ExecutionEvent>,
    pub final_status: FinalStatus,
    pub completion_percentage: f64,
    pub estimated_remaining_hours: f64,
}

impl SimulationResponse {
    fn failed(error: String) -> Self {
        Self {
            execution_log: Vec::new(),
            final_status: FinalStatus::Error { error },
            completion_percentage: 0.0,
            estimated_remaining_hours: 0.0,
        }
    }

    fn from_outcome(outcome: &SimulationOutcome) -> Self {
        let summary = metrics::summarize(outcome);
        Self {
            execution_log: outcome.log.clone(),
            completion_percentage: summary.completion_rate,
            estimated_remaining_hours: metrics::remaining_hours(outcome),
            final_status: FinalStatus::Summary(summary),
        }
    }
}

/// Runs simulations for projects held in a store.
///
/// Collaborators are injected; there is no global registry.
pub struct SimulationService {
    store: Arc<dyn ProjectStore>,
    oracle: Arc<dyn AssignmentOracle>,
    processor: Option<Arc<dyn TaskProcessor>>,
    config: SimulationConfig,
}

impl SimulationService {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        oracle: Arc<dyn AssignmentOracle>,
        config: SimulationConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            oracle,
            processor: None,
            config,
        })
    }

    pub fn with_processor(mut self, processor: Arc<dyn TaskProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Simulate the requested project until done, capped or cancelled.
    pub async fn simulate(
        &self,
        request: &SimulationRequest,
        cancel: &CancellationToken,
    ) -> SimulationResponse {
        let project = match self.load(&request.project_id).await {
            Ok(project) => project,
            Err(e) => {
                tplog_error!("Simulation of {} aborted: {}", request.project_id, e);
                return SimulationResponse::failed(e.to_string());
            }
        };

        if !request.simulation_mode {
            tplog_warn!(
                "Real execution requested for {}; running simulation instead",
                project.id
            );
        }

        let capacity = request.capacity();
        if capacity != request.max_concurrent_tasks_per_agent {
            tplog_warn!(
                "Agent capacity {} out of range, using {}",
                request.max_concurrent_tasks_per_agent,
                capacity
            );
        }

        let engine = match self.engine(&project, capacity) {
            Ok(engine) => engine,
            Err(e) => return SimulationResponse::failed(e.to_string()),
        };

        let outcome = engine.run(project.tasks, cancel).await;
        let response = SimulationResponse::from_outcome(&outcome);
        tplog!(
            "Simulated {}: {:.1}% complete after {} rounds, {:.1}h remaining",
            request.project_id,
            response.completion_percentage,
            outcome.rounds,
            response.estimated_remaining_hours
        );
        response
    }

    async fn load(&self, id: &ProjectId) -> Result<Project> {
        let mut project = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| Error::ProjectNotFound(id.to_string()))?;
        project.validate()?;
        Ok(project)
    }

    fn engine(&self, project: &Project, capacity: usize) -> Result<ExecutionEngine> {
        let pool = AgentPool::from_descriptors(&project.agents, capacity).with_capacity(capacity);
        let selector =
            AgentSelector::new(Arc::clone(&self.oracle)).with_timeout(self.config.oracle_timeout);
        let engine = ExecutionEngine::new(self.config.clone(), selector, pool)?;
        Ok(match &self.processor {
            Some(p) => engine.with_processor(Arc::clone(p)),
            None => engine,
        })
    }
}
