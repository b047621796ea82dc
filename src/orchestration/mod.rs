//! Scheduling and simulated execution of decomposed projects.
//!
//! The [`TopologicalScheduler`] orders tasks, the [`ExecutionEngine`] runs
//! them round by round against an [`AgentPool`], and [`metrics`] turns the
//! result into a summary. Oracles are injected through the traits in
//! [`oracle`]; [`SimulationService`] and [`Decomposer`] wire everything to
//! a project store.

pub mod assignment;
pub mod decomposition;
pub mod engine;
pub mod events;
pub mod metrics;
pub mod oracle;
pub mod pool;
pub mod scheduler;
pub mod service;

pub use assignment::{AgentChoice, AgentSelector};
pub use decomposition::{
    ComplexityDistribution, DecompositionRequest, DecompositionResponse, Decomposer, LayerReport,
    PlanStep, QualityMetrics,
};
pub use engine::{
    ExecutionEngine, InFlightTask, RoundSnapshot, SimClock, SimulationConfig, SimulationOutcome,
    DEFAULT_MAX_ROUNDS, DEFAULT_ROUND_MINUTES, MAX_SIMULATED_HOURS,
};
pub use events::{EventKind, ExecutionEvent};
pub use metrics::{completion_percentage, remaining_hours, summarize, ExecutionSummary};
pub use oracle::{
    AgentSuggestion, AssignmentOracle, AssignmentRequest, CategoryRouter, DecompositionContext,
    DecompositionOracle, OracleError, OracleOutcome, ProcessingSummary, SubtaskProposal,
    TaskProcessor, DEFAULT_ORACLE_TIMEOUT_SECS,
};
pub use pool::{AgentDescriptor, AgentPool, AgentSummary, AgentType, DEFAULT_AGENT_CAPACITY};
pub use scheduler::{Schedule, TopologicalScheduler};
pub use service::{FinalStatus, SimulationRequest, SimulationResponse, SimulationService};
