//! Feature request decomposition.
//!
//! A request becomes a project with one root task, which is then split
//! breadth-first by the decomposition oracle, one layer per depth level.
//! A task that was split is marked Completed: its work now lives in its
//! subtasks. The finished project is ordered by the scheduler into an
//! execution plan and scored with a few structural quality metrics.

use crate::core::{
    Priority, Project, ProjectId, Task, TaskGraph, TaskId, TaskStatus, DEFAULT_ESTIMATED_HOURS,
};
use crate::error::{Error, Result};
use crate::orchestration::assignment::AgentSelector;
use crate::orchestration::oracle::{
    with_timeout, DecompositionContext, DecompositionOracle, OracleError, SubtaskProposal,
    DEFAULT_ORACLE_TIMEOUT_SECS,
};
use crate::orchestration::pool::{AgentDescriptor, AgentPool, AgentType, DEFAULT_AGENT_CAPACITY};
use crate::orchestration::scheduler::TopologicalScheduler;
use crate::{tplog, tplog_debug, tplog_warn};
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const MAX_DEPTH_LIMIT: usize = 5;

const ROOT_TITLE: &str = "Main Feature Request";
const ROOT_CATEGORY: &str = "planning";
const PROJECT_NAME_CHARS: usize = 50;

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_include_estimates() -> bool {
    true
}

/// What to decompose and how deep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionRequest {
    pub user_input: String,
    #[serde(default)]
    pub project_context: Option<String>,
    /// Number of layers, 1-5.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Keep oracle estimates on the created subtasks.
    #[serde(default = "default_include_estimates")]
    pub include_estimates: bool,
}

impl DecompositionRequest {
    pub fn new(user_input: &str) -> Self {
        Self {
            user_input: user_input.to_string(),
            project_context: None,
            max_depth: DEFAULT_MAX_DEPTH,
            include_estimates: true,
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.project_context = Some(context.to_string());
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_input.trim().is_empty() {
            return Err(Error::Validation("user_input must not be empty".into()));
        }
        if !(1..=MAX_DEPTH_LIMIT).contains(&self.max_depth) {
            return Err(Error::Validation(format!(
                "max_depth must be between 1 and {}, got {}",
                MAX_DEPTH_LIMIT, self.max_depth
            )));
        }
        Ok(())
    }
}

/// What happened at one depth level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerReport {
    pub depth: usize,
    pub tasks_processed: usize,
    pub subtasks_created: usize,
    /// One note per failed oracle call.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// One step of the execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-based.
    pub step: usize,
    pub task_id: TaskId,
    pub task_title: String,
    pub suggested_agent: AgentType,
    pub priority: Priority,
    pub estimated_hours: f64,
    pub dependencies: Vec<TaskId>,
    pub category: String,
}

/// Estimate buckets: low up to 4h, medium up to 12h, high above.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl ComplexityDistribution {
    fn record(&mut self, hours: f64) {
        if hours <= 4.0 {
            self.low += 1;
        } else if hours <= 12.0 {
            self.medium += 1;
        } else {
            self.high += 1;
        }
    }
}

/// Structural quality of a decomposed project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub total_tasks: usize,
    /// Percent of tasks with a non-empty description.
    pub description_coverage: f64,
    /// Percent of tasks with an estimate.
    pub estimation_coverage: f64,
    /// Percent of tasks with at least one dependency.
    pub dependency_coverage: f64,
    /// Mean over tasks that have an estimate.
    pub average_estimated_hours: f64,
    /// Over tasks that have an estimate.
    pub complexity: ComplexityDistribution,
    pub dangling_dependencies: usize,
    pub cycles: usize,
}

impl QualityMetrics {
    pub fn measure(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let percent = |n: usize| {
            if total == 0 {
                0.0
            } else {
                n as f64 / total as f64 * 100.0
            }
        };

        let estimates: Vec<f64> = tasks.iter().filter_map(|t| t.estimated_hours).collect();
        let mut complexity = ComplexityDistribution::default();
        for h in &estimates {
            complexity.record(*h);
        }
        let average_estimated_hours = if estimates.is_empty() {
            0.0
        } else {
            estimates.iter().sum::<f64>() / estimates.len() as f64
        };

        let graph = TaskGraph::from_tasks(tasks);

        Self {
            total_tasks: total,
            description_coverage: percent(
                tasks.iter().filter(|t| !t.description.trim().is_empty()).count(),
            ),
            estimation_coverage: percent(estimates.len()),
            dependency_coverage: percent(tasks.iter().filter(|t| !t.dependencies.is_empty()).count()),
            average_estimated_hours,
            complexity,
            dangling_dependencies: graph.dangling_dependencies().len(),
            cycles: graph.cycles().len(),
        }
    }
}

/// Everything a decomposition produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionResponse {
    pub project: Project,
    pub summary: String,
    pub execution_plan: Vec<PlanStep>,
    pub layers: Vec<LayerReport>,
    pub quality: QualityMetrics,
}

impl DecompositionResponse {
    /// Subtasks created across all layers.
    pub fn tasks_created(&self) -> usize {
        self.layers.iter().map(|l| l.subtasks_created).sum()
    }
}

/// Splits feature requests into projects.
pub struct Decomposer {
    oracle: Arc<dyn DecompositionOracle>,
    selector: AgentSelector,
    timeout: Duration,
}

impl Decomposer {
    /// The selector's fallback becomes `Planner`.
    pub fn new(oracle: Arc<dyn DecompositionOracle>, selector: AgentSelector) -> Self {
        Self {
            oracle,
            selector: selector.with_fallback(AgentType::Planner),
            timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn decompose(&self, request: &DecompositionRequest) -> Result<DecompositionResponse> {
        request.validate()?;

        let mut project = new_project(request);
        let root = Task::new(TaskId::generate(), ROOT_TITLE, &request.user_input)
            .with_priority(Priority::HIGHEST.value().into())
            .with_category(ROOT_CATEGORY);
        let mut layer = vec![root.id.clone()];
        project.add_task(root)?;

        tplog!(
            "Decomposing '{}' into project {} (max depth {})",
            truncate(&request.user_input, PROJECT_NAME_CHARS),
            project.id,
            request.max_depth
        );

        let mut layers = Vec::new();
        let mut depth = 0;
        while depth < request.max_depth && !layer.is_empty() {
            let (report, next) = self.split_layer(&mut project, &layer, depth, request).await?;
            tplog_debug!(
                "Layer {}: {} processed, {} created, {} errors",
                depth,
                report.tasks_processed,
                report.subtasks_created,
                report.errors.len()
            );
            layers.push(report);
            layer = next;
            depth += 1;
        }

        let execution_plan = self.plan(&project).await;
        let quality = QualityMetrics::measure(&project.tasks);
        let created: usize = layers.iter().map(|l| l.subtasks_created).sum();
        let summary = format!(
            "Decomposition completed with {} tasks created across {} layers.",
            created,
            layers.len()
        );

        Ok(DecompositionResponse {
            project,
            summary,
            execution_plan,
            layers,
            quality,
        })
    }

    /// Decompose every unfinished task of one layer. Returns the report and
    /// the ids forming the next layer.
    async fn split_layer(
        &self,
        project: &mut Project,
        layer: &[TaskId],
        depth: usize,
        request: &DecompositionRequest,
    ) -> Result<(LayerReport, Vec<TaskId>)> {
        let context = DecompositionContext {
            project_description: project.description.clone(),
            project_context: request.project_context.clone(),
            depth,
        };

        let parents: Vec<Task> = layer
            .iter()
            .filter_map(|id| project.get_task(id))
            .filter(|t| t.status != TaskStatus::Completed)
            .cloned()
            .collect();

        let results = join_all(
            parents
                .iter()
                .map(|t| with_timeout(self.timeout, self.oracle.decompose(t, &context))),
        )
        .await;

        let mut report = LayerReport {
            depth,
            ..LayerReport::default()
        };
        let mut next = Vec::new();

        for (parent, result) in parents.iter().zip(results) {
            report.tasks_processed += 1;
            match result {
                Ok(proposals) => {
                    let children =
                        self.attach_subtasks(project, &parent.id, proposals, request.include_estimates)?;
                    report.subtasks_created += children.len();
                    next.extend(children);
                }
                Err(e) => {
                    tplog_warn!("Decomposition failed for task {}: {}", parent.id, e);
                    report.errors.push(failure_note(&parent.id, &e));
                }
            }
        }

        Ok((report, next))
    }

    /// Append subtasks under `parent_id`. The parent is marked Completed
    /// when at least one subtask was created.
    fn attach_subtasks(
        &self,
        project: &mut Project,
        parent_id: &TaskId,
        proposals: Vec<SubtaskProposal>,
        include_estimates: bool,
    ) -> Result<Vec<TaskId>> {
        let mut children = Vec::with_capacity(proposals.len());

        for (i, proposal) in proposals.into_iter().enumerate() {
            let mut id = proposal
                .id
                .filter(|id| !id.trim().is_empty())
                .map(TaskId::new)
                .unwrap_or_else(TaskId::generate);
            if project.contains_task(&id) {
                let fresh = TaskId::generate();
                tplog_warn!("Subtask id {} already used, renamed to {}", id, fresh);
                id = fresh;
            }

            let title = if proposal.title.trim().is_empty() {
                format!("Subtask {}", i + 1)
            } else {
                proposal.title
            };

            let mut task = Task::new(id, &title, &proposal.description)
                .with_priority(proposal.priority.unwrap_or(i64::from(Priority::NORMAL.value())));
            if let Some(category) = proposal.category.filter(|c| !c.trim().is_empty()) {
                task = task.with_category(&category);
            }
            if include_estimates {
                task.estimated_hours = proposal.estimated_hours;
            }
            for dep in proposal.dependencies {
                task.add_dependency(TaskId::new(dep));
            }
            task.parent_task = Some(parent_id.clone());

            children.push(task.id.clone());
            project.add_task(task)?;
        }

        if let Some(parent) = project.get_task_mut(parent_id) {
            parent.subtasks = children.clone();
            if !children.is_empty() {
                parent.complete(Utc::now());
            }
        }
        Ok(children)
    }

    /// Scheduler order with a suggested agent per step.
    async fn plan(&self, project: &Project) -> Vec<PlanStep> {
        let ordered = TopologicalScheduler::new().order(&project.tasks);
        let agents = AgentPool::from_descriptors(&project.agents, DEFAULT_AGENT_CAPACITY).summaries();

        let choices = join_all(ordered.iter().map(|t| self.selector.select(t, &agents))).await;

        ordered
            .into_iter()
            .zip(choices)
            .enumerate()
            .map(|(i, (task, choice))| PlanStep {
                step: i + 1,
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                suggested_agent: choice.value.agent_type,
                priority: task.priority,
                estimated_hours: task.estimated_hours_or(DEFAULT_ESTIMATED_HOURS),
                dependencies: task.dependencies.iter().cloned().collect(),
                category: task.category.clone(),
            })
            .collect()
    }
}

impl std::fmt::Debug for Decomposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decomposer")
            .field("selector", &self.selector)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn new_project(request: &DecompositionRequest) -> Project {
    let name = format!(
        "Project: {}...",
        truncate(&request.user_input, PROJECT_NAME_CHARS)
    );
    let mut project = Project::new(ProjectId::generate(), &name, &request.user_input);
    project.agents = AgentType::ALL
        .into_iter()
        .map(|t| AgentDescriptor::standard(t, DEFAULT_AGENT_CAPACITY))
        .collect();
    project
}

/// First `max` characters, on a char boundary.
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

fn failure_note(task: &TaskId, e: &OracleError) -> String {
    format!("Error decomposing task {}: {}", task, e)
}
