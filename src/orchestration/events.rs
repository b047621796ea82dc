//! Execution log entries.
//!
//! The execution log is append-only and ordered. Every entry carries the
//! simulated clock (hours since the run started) and the corresponding
//! timestamp, so a log can be replayed without wall-clock data.

use crate::core::TaskId;
use crate::orchestration::pool::AgentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in the execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    /// Simulated time of the entry.
    pub timestamp: DateTime<Utc>,
    /// Simulated hours since the run started.
    pub clock_hours: f64,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// The kinds of execution log entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Round heartbeat.
    State {
        message: String,
        round: u32,
        running_tasks: usize,
        queued_tasks: usize,
        completed_tasks: usize,
    },
    TaskStart {
        task_id: TaskId,
        task_title: String,
        agent_type: AgentType,
        estimated_hours: f64,
    },
    TaskProgress {
        task_id: TaskId,
        task_title: String,
        agent_type: AgentType,
        /// 0-100.
        progress_percentage: f64,
    },
    /// Summary returned by the task processor for an admitted task.
    TaskProcessing {
        task_id: TaskId,
        task_title: String,
        agent_type: AgentType,
        processing_result: String,
    },
    TaskCompletion {
        task_id: TaskId,
        task_title: String,
        agent_type: AgentType,
    },
    /// Non-fatal problem, e.g. a failed oracle call.
    Error { message: String },
}

impl EventKind {
    /// Wire name of the kind, as used in the `type` field.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::State { .. } => "state",
            EventKind::TaskStart { .. } => "task_start",
            EventKind::TaskProgress { .. } => "task_progress",
            EventKind::TaskProcessing { .. } => "task_processing",
            EventKind::TaskCompletion { .. } => "task_completion",
            EventKind::Error { .. } => "error",
        }
    }

    /// The task this entry is about, if any.
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            EventKind::TaskStart { task_id, .. }
            | EventKind::TaskProgress { task_id, .. }
            | EventKind::TaskProcessing { task_id, .. }
            | EventKind::TaskCompletion { task_id, .. } => Some(task_id),
            EventKind::State { .. } | EventKind::Error { .. } => None,
        }
    }
}

impl ExecutionEvent {
    pub fn is_error(&self) -> bool {
        matches!(self.kind, EventKind::Error { .. })
    }
}
