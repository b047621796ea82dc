//! Round-based execution simulation.
//!
//! The engine owns all simulation state for one run. Each round:
//!
//! 1. advances in-flight tasks, completing those whose elapsed simulated
//!    time has reached their estimate,
//! 2. admits ready tasks from the queue into free agent capacity,
//! 3. advances the simulated clock by one increment.
//!
//! The run ends when the queue and in-flight set are both empty, when the
//! round cap is reached, or when the cancellation token fires. Partial
//! results are returned in every case.
//!
//! Oracle calls for the tasks considered in one admission wave are issued
//! concurrently. Their results are applied one by one in queue order, so the
//! execution log only depends on the inputs and the oracle answers. A wave
//! that completes zero-hour tasks frees their slots and may ready their
//! dependents, so admission runs further waves in the same round until
//! nothing more can start.

use crate::core::{Task, TaskId, TaskStatus, DEFAULT_ESTIMATED_HOURS};
use crate::error::{Error, Result};
use crate::orchestration::assignment::{AgentChoice, AgentSelector};
use crate::orchestration::events::{EventKind, ExecutionEvent};
use crate::orchestration::oracle::{
    with_timeout, OracleError, OracleOutcome, ProcessingSummary, TaskProcessor,
    DEFAULT_ORACLE_TIMEOUT_SECS,
};
use crate::orchestration::pool::{AgentPool, AgentType};
use crate::orchestration::scheduler::TopologicalScheduler;
use crate::{tplog_debug, tplog_trace, tplog_warn};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Simulated minutes per round unless configured otherwise.
pub const DEFAULT_ROUND_MINUTES: u32 = 30;

/// Round cap unless configured otherwise.
pub const DEFAULT_MAX_ROUNDS: u32 = 50;

/// Longest simulated span a run may cover: one thousand years.
pub const MAX_SIMULATED_HOURS: f64 = 1000.0 * 365.25 * 24.0;

/// Runtime policy for one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Simulated hours per round.
    pub round_increment_hours: f64,
    /// Hard bound on rounds; guarantees termination.
    pub max_rounds: u32,
    /// Deadline for each oracle or processor call.
    pub oracle_timeout: Duration,
    /// Estimate used for tasks without a usable one.
    pub default_estimated_hours: f64,
    /// Simulated time of round one. `None` uses the wall clock at start.
    pub start_time: Option<DateTime<Utc>>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            round_increment_hours: f64::from(DEFAULT_ROUND_MINUTES) / 60.0,
            max_rounds: DEFAULT_MAX_ROUNDS,
            oracle_timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
            default_estimated_hours: DEFAULT_ESTIMATED_HOURS,
            start_time: None,
        }
    }
}

impl SimulationConfig {
    pub fn with_start_time(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Reject settings that would stall or never start the clock.
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(Error::Validation("max_rounds must be at least 1".into()));
        }
        if !(self.round_increment_hours.is_finite() && self.round_increment_hours > 0.0) {
            return Err(Error::Validation(format!(
                "round increment must be positive, got {}h",
                self.round_increment_hours
            )));
        }
        let horizon = self.round_increment_hours * f64::from(self.max_rounds);
        if horizon > MAX_SIMULATED_HOURS {
            return Err(Error::Validation(format!(
                "{} rounds of {}h span {}h, more than the {}h limit",
                self.max_rounds, self.round_increment_hours, horizon, MAX_SIMULATED_HOURS
            )));
        }
        if !(self.default_estimated_hours.is_finite() && self.default_estimated_hours >= 0.0) {
            return Err(Error::Validation(format!(
                "default estimate must be non-negative, got {}h",
                self.default_estimated_hours
            )));
        }
        Ok(())
    }
}

/// Simulated clock. Time is derived from the tick count so it never drifts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimClock {
    start: DateTime<Utc>,
    increment_hours: f64,
    ticks: u32,
}

impl SimClock {
    pub fn new(start: DateTime<Utc>, increment_hours: f64) -> Self {
        Self {
            start,
            increment_hours,
            ticks: 0,
        }
    }

    /// Hours since the run started.
    pub fn hours(&self) -> f64 {
        f64::from(self.ticks) * self.increment_hours
    }

    /// The simulated instant corresponding to `hours`, saturating at the
    /// latest representable date.
    pub fn timestamp_at(&self, hours: f64) -> DateTime<Utc> {
        // `as` saturates, and any non-negative i64 is a valid delta.
        let millis = ((hours * 3_600_000.0).round() as i64).max(0);
        self.start
            .checked_add_signed(chrono::Duration::milliseconds(millis))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.timestamp_at(self.hours())
    }

    pub fn tick(&mut self) {
        self.ticks += 1;
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}

/// A task currently held by an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct InFlightTask {
    pub task: Task,
    pub agent_type: AgentType,
    /// Simulated hours at admission.
    pub started_at_hours: f64,
    /// Estimate fixed at admission.
    pub estimated_hours: f64,
}

impl InFlightTask {
    pub fn elapsed(&self, clock_hours: f64) -> f64 {
        clock_hours - self.started_at_hours
    }

    /// Hours of work left, never negative.
    pub fn remaining(&self, clock_hours: f64) -> f64 {
        (self.estimated_hours - self.elapsed(clock_hours)).max(0.0)
    }
}

/// State counts at the end of a round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSnapshot {
    pub round: u32,
    /// Clock after the round's increment.
    pub clock_hours: f64,
    pub completed: usize,
    pub failed: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub workloads: BTreeMap<AgentType, usize>,
}

impl RoundSnapshot {
    /// Every task is in exactly one set.
    pub fn accounted(&self) -> usize {
        self.completed + self.failed + self.queued + self.in_flight
    }
}

/// Everything a run produced, complete or not.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub total_tasks: usize,
    pub log: Vec<ExecutionEvent>,
    pub completed: Vec<Task>,
    pub failed: Vec<Task>,
    /// Tasks never admitted, in queue order.
    pub queued: Vec<Task>,
    pub in_flight: Vec<InFlightTask>,
    pub rounds: u32,
    /// Simulated hours when the run stopped.
    pub clock_hours: f64,
    pub cancelled: bool,
    pub hit_round_cap: bool,
    /// Live workload per agent type when the run stopped.
    pub workloads: BTreeMap<AgentType, usize>,
    /// Admissions per agent type over the whole run.
    pub assignments: BTreeMap<AgentType, usize>,
    pub snapshots: Vec<RoundSnapshot>,
    pub default_estimated_hours: f64,
}

impl SimulationOutcome {
    /// All work drained without cancellation.
    pub fn success(&self) -> bool {
        !self.cancelled && self.queued.is_empty() && self.in_flight.is_empty()
    }

    pub fn is_completed(&self, id: &TaskId) -> bool {
        self.completed.iter().any(|t| &t.id == id)
    }

    /// Completed task ids in completion order.
    pub fn completion_order(&self) -> Vec<&TaskId> {
        self.completed
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| &t.id)
            .collect()
    }
}

struct Admission {
    task: Task,
    agent_type: AgentType,
    choice: OracleOutcome<AgentChoice>,
}

enum Decision {
    Admitted(Admission),
    /// Left in the queue: either requeued on a full agent or never reached.
    Deferred {
        task_id: TaskId,
        choice: OracleOutcome<AgentChoice>,
    },
}

/// Drives one simulation run.
///
/// The engine is consumed by [`ExecutionEngine::run`]; each run gets its
/// own pool counters and log.
pub struct ExecutionEngine {
    config: SimulationConfig,
    selector: AgentSelector,
    processor: Option<Arc<dyn TaskProcessor>>,
    pool: AgentPool,
}

impl ExecutionEngine {
    pub fn new(config: SimulationConfig, selector: AgentSelector, pool: AgentPool) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            selector,
            processor: None,
            pool,
        })
    }

    /// Hand every admitted task to `processor` and log its summary.
    pub fn with_processor(mut self, processor: Arc<dyn TaskProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulate `tasks` until drained, capped or cancelled.
    ///
    /// Tasks already `Completed` count as done from the start; `Cancelled`
    /// tasks go straight to the failed set. Everything else is reset to
    /// Pending and queued in scheduler order.
    pub async fn run(self, tasks: Vec<Task>, cancel: &CancellationToken) -> SimulationOutcome {
        let start = self.config.start_time.unwrap_or_else(Utc::now);
        let mut run = Run::new(self, start, tasks);
        run.execute(cancel).await;
        run.finish()
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("config", &self.config)
            .field("selector", &self.selector)
            .field("has_processor", &self.processor.is_some())
            .finish()
    }
}

/// Mutable state of one run.
struct Run {
    engine: ExecutionEngine,
    clock: SimClock,
    total: usize,
    present: HashSet<TaskId>,
    queue: VecDeque<Task>,
    in_flight: Vec<InFlightTask>,
    completed: Vec<Task>,
    completed_ids: HashSet<TaskId>,
    failed: Vec<Task>,
    log: Vec<ExecutionEvent>,
    assignments: BTreeMap<AgentType, usize>,
    snapshots: Vec<RoundSnapshot>,
    rounds: u32,
    cancelled: bool,
    hit_round_cap: bool,
}

impl Run {
    fn new(engine: ExecutionEngine, start: DateTime<Utc>, tasks: Vec<Task>) -> Self {
        let clock = SimClock::new(start, engine.config.round_increment_hours);
        let total = tasks.len();
        let present = tasks.iter().map(|t| t.id.clone()).collect();

        let mut completed = Vec::new();
        let mut failed = Vec::new();
        let mut pending = Vec::new();
        for mut task in tasks {
            match task.status {
                TaskStatus::Completed => completed.push(task),
                TaskStatus::Cancelled => failed.push(task),
                _ => {
                    task.reset();
                    pending.push(task);
                }
            }
        }
        let completed_ids = completed.iter().map(|t| t.id.clone()).collect();
        let queue = TopologicalScheduler::new().plan(&pending).to_tasks().into();

        Self {
            engine,
            clock,
            total,
            present,
            queue,
            in_flight: Vec::new(),
            completed,
            completed_ids,
            failed,
            log: Vec::new(),
            assignments: BTreeMap::new(),
            snapshots: Vec::new(),
            rounds: 0,
            cancelled: false,
            hit_round_cap: false,
        }
    }

    async fn execute(&mut self, cancel: &CancellationToken) {
        tplog_debug!(
            "Simulation start: {} tasks ({} queued, {} already completed, {} cancelled)",
            self.total,
            self.queue.len(),
            self.completed.len(),
            self.failed.len()
        );

        while !(self.queue.is_empty() && self.in_flight.is_empty()) {
            if cancel.is_cancelled() {
                tplog_warn!("Simulation cancelled after {} rounds", self.rounds);
                self.cancelled = true;
                break;
            }
            if self.rounds >= self.engine.config.max_rounds {
                tplog_warn!(
                    "Simulation hit round cap ({}), {} queued and {} in flight remain",
                    self.engine.config.max_rounds,
                    self.queue.len(),
                    self.in_flight.len()
                );
                self.hit_round_cap = true;
                break;
            }

            self.rounds += 1;
            self.heartbeat();
            self.advance_in_flight();
            self.admit().await;
            self.clock.tick();
            self.snapshot();
        }
    }

    fn emit(&mut self, kind: EventKind) {
        let clock_hours = self.clock.hours();
        let event = ExecutionEvent {
            timestamp: self.clock.timestamp_at(clock_hours),
            clock_hours,
            kind,
        };
        tplog_trace!("[{:.2}h] {}", clock_hours, event.kind.name());
        self.log.push(event);
    }

    fn heartbeat(&mut self) {
        tplog_debug!(
            "Round {} at {:.2}h: {} running, {} queued, {} completed",
            self.rounds,
            self.clock.hours(),
            self.in_flight.len(),
            self.queue.len(),
            self.completed.len()
        );
        self.emit(EventKind::State {
            message: format!("Execution Round {}", self.rounds),
            round: self.rounds,
            running_tasks: self.in_flight.len(),
            queued_tasks: self.queue.len(),
            completed_tasks: self.completed.len(),
        });
    }

    fn advance_in_flight(&mut self) {
        let now = self.clock.hours();
        let in_flight = std::mem::take(&mut self.in_flight);
        for entry in in_flight {
            let elapsed = entry.elapsed(now);
            if elapsed >= entry.estimated_hours {
                self.complete(entry.task, entry.agent_type);
            } else {
                let fraction = (elapsed / entry.estimated_hours).clamp(0.0, 1.0);
                self.emit(EventKind::TaskProgress {
                    task_id: entry.task.id.clone(),
                    task_title: entry.task.title.clone(),
                    agent_type: entry.agent_type,
                    progress_percentage: fraction * 100.0,
                });
                self.in_flight.push(entry);
            }
        }
    }

    fn complete(&mut self, mut task: Task, agent_type: AgentType) {
        task.complete(self.clock.now());
        self.engine.pool.release(agent_type);
        self.emit(EventKind::TaskCompletion {
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            agent_type,
        });
        self.completed_ids.insert(task.id.clone());
        self.completed.push(task);
    }

    /// Ready means every dependency is completed or dangling.
    fn is_ready(&self, task: &Task) -> bool {
        task.dependencies
            .iter()
            .all(|dep| self.completed_ids.contains(dep) || !self.present.contains(dep))
    }

    async fn admit(&mut self) {
        while self.admit_wave().await {}
    }

    /// Admit up to the current free capacity. Returns whether another wave
    /// could start more: some task finished on admission and none was
    /// deferred.
    async fn admit_wave(&mut self) -> bool {
        let free = self.engine.pool.free_capacity();
        if free == 0 || self.queue.is_empty() {
            return false;
        }

        // Queue positions of the first `free` ready tasks, front to back.
        let candidates: Vec<usize> = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, t)| self.is_ready(t))
            .map(|(i, _)| i)
            .take(free)
            .collect();
        if candidates.is_empty() {
            return false;
        }

        let agents = self.engine.pool.summaries();
        let selector = &self.engine.selector;
        let choices = join_all(
            candidates
                .iter()
                .map(|&i| selector.select(&self.queue[i], &agents)),
        )
        .await;

        let decisions = self.commit(&candidates, choices);
        let processing = self.process(&decisions).await;

        let mut deferred = false;
        let mut finished = false;
        for (decision, processed) in decisions.into_iter().zip(processing) {
            match decision {
                Decision::Admitted(admission) => {
                    finished |= self.record_admission(admission, processed);
                }
                Decision::Deferred { task_id, choice } => {
                    deferred = true;
                    if let Some(failure) = &choice.failure {
                        self.selection_error(&task_id, failure);
                    }
                }
            }
        }
        finished && !deferred
    }

    /// Apply oracle answers in queue order. The first task whose chosen
    /// agent type is full goes back to the queue front; it and every later
    /// candidate are deferred to the next round.
    fn commit(
        &mut self,
        candidates: &[usize],
        choices: Vec<OracleOutcome<AgentChoice>>,
    ) -> Vec<Decision> {
        let ids: Vec<TaskId> = candidates.iter().map(|&i| self.queue[i].id.clone()).collect();
        let mut decisions = Vec::with_capacity(candidates.len());
        let mut removed = 0;
        let mut full = false;

        for ((&position, task_id), choice) in candidates.iter().zip(ids).zip(choices) {
            if full {
                decisions.push(Decision::Deferred { task_id, choice });
                continue;
            }
            let Some(mut task) = self.queue.remove(position - removed) else {
                decisions.push(Decision::Deferred { task_id, choice });
                full = true;
                continue;
            };
            removed += 1;
            let agent_type = choice.value.agent_type;

            match self.engine.pool.acquire(agent_type) {
                Ok(()) => {
                    task.start(agent_type, self.clock.now());
                    *self.assignments.entry(agent_type).or_default() += 1;
                    decisions.push(Decision::Admitted(Admission {
                        task,
                        agent_type,
                        choice,
                    }));
                }
                Err(e) => {
                    tplog_debug!("Requeueing task {}: {}", task.id, e);
                    self.queue.push_front(task);
                    decisions.push(Decision::Deferred { task_id, choice });
                    full = true;
                }
            }
        }

        decisions
    }

    /// Run the task processor for every admitted task, concurrently.
    async fn process(
        &self,
        decisions: &[Decision],
    ) -> Vec<Option<std::result::Result<ProcessingSummary, OracleError>>> {
        let Some(processor) = &self.engine.processor else {
            return decisions.iter().map(|_| None).collect();
        };
        let limit = self.engine.config.oracle_timeout;

        join_all(decisions.iter().map(|decision| async move {
            match decision {
                Decision::Admitted(a) => Some(
                    with_timeout(limit, processor.process(&a.task, a.agent_type)).await,
                ),
                Decision::Deferred { .. } => None,
            }
        }))
        .await
    }

    fn selection_error(&mut self, task_id: &TaskId, failure: &OracleError) {
        tplog_warn!("Agent selection failed for task {}: {}", task_id, failure);
        self.emit(EventKind::Error {
            message: format!("Error selecting agent for task {}: {}", task_id, failure),
        });
    }

    /// Log the start and processing result. Returns whether the task
    /// completed on the spot.
    fn record_admission(
        &mut self,
        admission: Admission,
        processed: Option<std::result::Result<ProcessingSummary, OracleError>>,
    ) -> bool {
        let Admission {
            task,
            agent_type,
            choice,
        } = admission;

        if let Some(failure) = &choice.failure {
            self.selection_error(&task.id, failure);
        }

        let estimated_hours = task.estimated_hours_or(self.engine.config.default_estimated_hours);
        self.emit(EventKind::TaskStart {
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            agent_type,
            estimated_hours,
        });

        match processed {
            Some(Ok(summary)) => self.emit(EventKind::TaskProcessing {
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                agent_type,
                processing_result: summary.summary,
            }),
            Some(Err(e)) => {
                tplog_warn!("Processing failed for task {} on {}: {}", task.id, agent_type, e);
                self.emit(EventKind::Error {
                    message: format!(
                        "Error processing task {} with {}: {}",
                        task.id, agent_type, e
                    ),
                });
            }
            None => {}
        }

        // Zero elapsed already satisfies a zero estimate.
        if estimated_hours <= 0.0 {
            self.complete(task, agent_type);
            return true;
        }

        self.in_flight.push(InFlightTask {
            task,
            agent_type,
            started_at_hours: self.clock.hours(),
            estimated_hours,
        });
        false
    }

    fn snapshot(&mut self) {
        self.snapshots.push(RoundSnapshot {
            round: self.rounds,
            clock_hours: self.clock.hours(),
            completed: self.completed.len(),
            failed: self.failed.len(),
            queued: self.queue.len(),
            in_flight: self.in_flight.len(),
            workloads: self.engine.pool.workloads(),
        });
    }

    fn finish(self) -> SimulationOutcome {
        SimulationOutcome {
            total_tasks: self.total,
            log: self.log,
            completed: self.completed,
            failed: self.failed,
            queued: self.queue.into(),
            in_flight: self.in_flight,
            rounds: self.rounds,
            clock_hours: self.clock.hours(),
            cancelled: self.cancelled,
            hit_round_cap: self.hit_round_cap,
            workloads: self.engine.pool.workloads(),
            assignments: self.assignments,
            snapshots: self.snapshots,
            default_estimated_hours: self.engine.config.default_estimated_hours,
        }
    }
}
