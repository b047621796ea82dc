//! Task data model for the dependency graph.
//!
//! Tasks are the atomic units of work handed to agents. Each task tracks
//! its status, priority, estimate, assignment and dependency edges.

use crate::orchestration::AgentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Estimate used when a task carries none (or an unusable one).
pub const DEFAULT_ESTIMATED_HOURS: f64 = 4.0;

/// Category given to tasks that arrive without one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Identifier of a task within a project.
///
/// Ids are opaque strings. Dependencies may name ids that no task in the
/// project carries; those are dangling and count as satisfied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a task id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a fresh random task id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return at most the first 8 characters for display.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Task priority from 1 (lowest) to 5 (highest).
///
/// Out-of-range values are clamped on construction and deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const LOWEST: Priority = Priority(1);
    pub const NORMAL: Priority = Priority(3);
    pub const HIGHEST: Priority = Priority(5);

    pub fn new(value: i64) -> Self {
        Self(value.clamp(1, 5) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::LOWEST
    }
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Task status in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet admitted to an agent.
    #[default]
    Pending,
    /// Admitted and being worked on by an agent.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Cannot proceed.
    Blocked,
    /// Withdrawn; never executed.
    Cancelled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Blocked => write!(f, "blocked"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A single task in a project's dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier within the project.
    pub id: TaskId,
    /// Short human-readable title.
    pub title: String,
    /// What the task should accomplish.
    #[serde(default)]
    pub description: String,
    /// Current lifecycle status.
    #[serde(default)]
    pub status: TaskStatus,
    /// 1-5, 5 is most urgent.
    #[serde(default)]
    pub priority: Priority,
    /// Estimated effort in hours. `None` means "use the default".
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    /// Agent type the task was routed to, once admitted.
    #[serde(default)]
    pub assigned_agent: Option<AgentType>,
    /// Ids this task waits on. Never contains the task's own id.
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
    /// Children produced by decomposing this task.
    #[serde(default)]
    pub subtasks: Vec<TaskId>,
    /// The task this one was decomposed from.
    #[serde(default)]
    pub parent_task: Option<TaskId>,
    /// Free-form tag used for routing.
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl Task {
    /// Create a pending task with default priority, category and estimate.
    pub fn new(id: impl Into<TaskId>, title: &str, description: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.to_string(),
            description: description.to_string(),
            status: TaskStatus::Pending,
            priority: Priority::default(),
            estimated_hours: None,
            assigned_agent: None,
            dependencies: BTreeSet::new(),
            subtasks: Vec::new(),
            parent_task: None,
            category: default_category(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Priority::new(priority);
        self
    }

    pub fn with_estimate(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn with_dependency(mut self, id: impl Into<TaskId>) -> Self {
        self.add_dependency(id.into());
        self
    }

    /// Add a dependency edge. A dependency on the task itself is ignored.
    ///
    /// Returns whether the edge was added.
    pub fn add_dependency(&mut self, id: TaskId) -> bool {
        if id == self.id {
            return false;
        }
        self.dependencies.insert(id)
    }

    /// Remove any self-dependency that arrived through deserialization.
    pub fn normalize(&mut self) {
        let own = self.id.clone();
        self.dependencies.remove(&own);
    }

    /// Estimate in hours, falling back to `default` for missing, negative or
    /// non-finite values.
    pub fn estimated_hours_or(&self, default: f64) -> f64 {
        match self.estimated_hours {
            Some(h) if h.is_finite() && h >= 0.0 => h,
            _ => default,
        }
    }

    /// Estimate in hours with the standard default.
    pub fn effective_hours(&self) -> f64 {
        self.estimated_hours_or(DEFAULT_ESTIMATED_HOURS)
    }

    /// Admit the task to an agent at the given (simulated) time.
    pub fn start(&mut self, agent: AgentType, at: DateTime<Utc>) {
        self.status = TaskStatus::InProgress;
        self.assigned_agent = Some(agent);
        self.updated_at = at;
    }

    /// Mark the task completed at the given (simulated) time.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.updated_at = at;
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) {
        self.status = TaskStatus::Cancelled;
        self.updated_at = at;
    }

    /// Return the task to Pending, e.g. when re-queued for a new run.
    pub fn reset(&mut self) {
        self.status = TaskStatus::Pending;
        self.assigned_agent = None;
    }

    /// Check if the task is in a terminal state (Completed or Cancelled).
    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}
