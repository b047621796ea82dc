//! Project: a named graph of tasks plus the agents available to work on it.

use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use crate::orchestration::AgentDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifier of a project in a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A project: tasks (a graph, not a sequence) and agent descriptors.
///
/// Task ids are unique within a project. The project only ever grows by
/// appending decomposed subtasks; tasks are never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub agents: Vec<AgentDescriptor>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(id: impl Into<ProjectId>, name: &str, description: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.to_string(),
            description: description.to_string(),
            tasks: Vec::new(),
            agents: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a task, rejecting a duplicate id.
    pub fn add_task(&mut self, mut task: Task) -> Result<()> {
        if self.contains_task(&task.id) {
            return Err(Error::DuplicateTask(task.id.to_string()));
        }
        task.normalize();
        self.tasks.push(task);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Builder form of [`Project::add_task`] for fixtures and tests.
    pub fn with_task(mut self, task: Task) -> Result<Self> {
        self.add_task(task)?;
        Ok(self)
    }

    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.tasks.iter().any(|t| &t.id == id)
    }

    pub fn get_task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn get_task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Check the structural invariants of a loaded project.
    ///
    /// Strips self-dependencies and fails on duplicate task ids.
    pub fn validate(&mut self) -> Result<()> {
        let mut seen = HashSet::new();
        for task in &mut self.tasks {
            if !seen.insert(task.id.clone()) {
                return Err(Error::DuplicateTask(task.id.to_string()));
            }
            task.normalize();
        }
        Ok(())
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
