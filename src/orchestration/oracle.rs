//! Interfaces to the external oracles.
//!
//! The decomposition oracle turns a task into candidate subtasks, the
//! assignment oracle suggests which agent type should take a task, and the
//! task processor produces a summary of an agent's work. All three are
//! network services in practice, so every call can fail or hang.
//!
//! Failures are values: callers fold an [`OracleError`] into an
//! [`OracleOutcome`] carrying the safe default, so error handling is a data
//! decision rather than an early return.

use crate::core::Task;
use crate::orchestration::pool::{AgentSummary, AgentType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Default time allowed for a single oracle call.
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;

/// Why an oracle call produced no usable answer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
}

/// A value from an oracle call, or the default that replaced it.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleOutcome<T> {
    pub value: T,
    /// Set when `value` is a fallback.
    pub failure: Option<OracleError>,
}

impl<T> OracleOutcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            failure: None,
        }
    }

    pub fn fallback(value: T, failure: OracleError) -> Self {
        Self {
            value,
            failure: Some(failure),
        }
    }

    /// Fold a call result, substituting `default` on failure.
    pub fn from_result(result: Result<T, OracleError>, default: impl FnOnce() -> T) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::fallback(default(), e),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Run an oracle call with a deadline. An elapsed deadline is a failure.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, OracleError>
where
    F: Future<Output = Result<T, OracleError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(OracleError::Timeout(limit)),
    }
}

/// A candidate subtask returned by the decomposition oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskProposal {
    /// Oracle-chosen id; a fresh id is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub priority: Option<i64>,
    /// Ids of other tasks (siblings or existing ones) this depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl SubtaskProposal {
    pub fn new(title: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            description: String::new(),
            estimated_hours: None,
            priority: None,
            dependencies: Vec::new(),
            category: None,
        }
    }
}

/// Context handed to the decomposition oracle alongside the task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecompositionContext {
    pub project_description: String,
    #[serde(default)]
    pub project_context: Option<String>,
    /// Depth of the task being decomposed (root is 0).
    pub depth: usize,
}

/// Splits a task into candidate subtasks.
#[async_trait]
pub trait DecompositionOracle: Send + Sync {
    async fn decompose(
        &self,
        task: &Task,
        context: &DecompositionContext,
    ) -> Result<Vec<SubtaskProposal>, OracleError>;
}

/// The part of a task the assignment oracle is shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub title: String,
    pub description: String,
    pub category: String,
}

impl From<&Task> for AssignmentRequest {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category.clone(),
        }
    }
}

/// Raw answer of the assignment oracle. `agent_type` is free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSuggestion {
    pub agent_type: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Suggests which agent type should take a task.
#[async_trait]
pub trait AssignmentOracle: Send + Sync {
    async fn suggest_agent(
        &self,
        task: &AssignmentRequest,
        agents: &[AgentSummary],
    ) -> Result<AgentSuggestion, OracleError>;
}

/// Summary of an agent's work on a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub summary: String,
}

/// Runs the agent-side processing of an admitted task.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(
        &self,
        task: &Task,
        agent: AgentType,
    ) -> Result<ProcessingSummary, OracleError>;
}

/// Assignment oracle that routes on the task's category tag.
///
/// Categories are matched case-insensitively against a fixed table; an
/// unrouted category is answered with the configured fallback at low
/// confidence. Never fails.
#[derive(Debug, Clone)]
pub struct CategoryRouter {
    routes: BTreeMap<String, AgentType>,
    fallback: AgentType,
}

impl CategoryRouter {
    pub fn new(routes: BTreeMap<String, AgentType>) -> Self {
        Self {
            routes: routes
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            fallback: AgentType::Developer,
        }
    }

    pub fn with_fallback(mut self, fallback: AgentType) -> Self {
        self.fallback = fallback;
        self
    }

    /// The route table used when configuration provides none.
    pub fn default_routes() -> BTreeMap<String, AgentType> {
        [
            ("planning", AgentType::Planner),
            ("analysis", AgentType::Analyzer),
            ("research", AgentType::Analyzer),
            ("design", AgentType::Analyzer),
            ("development", AgentType::Developer),
            ("implementation", AgentType::Developer),
            ("testing", AgentType::Tester),
            ("qa", AgentType::Tester),
            ("review", AgentType::Reviewer),
            ("documentation", AgentType::Reviewer),
            ("coordination", AgentType::Coordinator),
            ("deployment", AgentType::Coordinator),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    pub fn route(&self, category: &str) -> Option<AgentType> {
        self.routes.get(&category.trim().to_ascii_lowercase()).copied()
    }
}

impl Default for CategoryRouter {
    fn default() -> Self {
        Self::new(Self::default_routes())
    }
}

#[async_trait]
impl AssignmentOracle for CategoryRouter {
    async fn suggest_agent(
        &self,
        task: &AssignmentRequest,
        _agents: &[AgentSummary],
    ) -> Result<AgentSuggestion, OracleError> {
        Ok(match self.route(&task.category) {
            Some(t) => AgentSuggestion {
                agent_type: t.to_string(),
                confidence: 0.9,
            },
            None => AgentSuggestion {
                agent_type: self.fallback.to_string(),
                confidence: 0.1,
            },
        })
    }
}
