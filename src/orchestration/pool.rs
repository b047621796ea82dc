//! Agent pool for typed workers.
//!
//! The `AgentPool` holds one descriptor per agent type, enforces each
//! type's concurrent-task capacity and tracks live workload counters.
//! During a simulation run the engine owns the pool exclusively; counters
//! never go negative and never exceed capacity.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default number of tasks a single agent type may work on at once.
pub const DEFAULT_AGENT_CAPACITY: usize = 3;

/// The fixed set of specialised worker types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Planner,
    Analyzer,
    Developer,
    Tester,
    Reviewer,
    Coordinator,
}

impl AgentType {
    /// All agent types in declaration order.
    pub const ALL: [AgentType; 6] = [
        AgentType::Planner,
        AgentType::Analyzer,
        AgentType::Developer,
        AgentType::Tester,
        AgentType::Reviewer,
        AgentType::Coordinator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Planner => "planner",
            AgentType::Analyzer => "analyzer",
            AgentType::Developer => "developer",
            AgentType::Tester => "tester",
            AgentType::Reviewer => "reviewer",
            AgentType::Coordinator => "coordinator",
        }
    }

    /// Map a free-form suggestion onto an agent type.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Returns `None` for anything that is not exactly a type name.
    pub fn parse_suggestion(s: &str) -> Option<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == wanted)
    }

    fn display_name(&self) -> &'static str {
        match self {
            AgentType::Planner => "Strategic Planner",
            AgentType::Analyzer => "Technical Analyzer",
            AgentType::Developer => "Code Developer",
            AgentType::Tester => "Quality Tester",
            AgentType::Reviewer => "Code Reviewer",
            AgentType::Coordinator => "Workflow Coordinator",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            AgentType::Planner => {
                "Decomposes high-level requirements into detailed, actionable tasks"
            }
            AgentType::Analyzer => {
                "Analyzes requirements, assesses technical feasibility, and identifies potential issues"
            }
            AgentType::Developer => {
                "Implements features, writes code, and handles technical implementation tasks"
            }
            AgentType::Tester => {
                "Creates test cases, performs quality assurance, and validates implementations"
            }
            AgentType::Reviewer => {
                "Reviews code, assesses quality, and provides feedback for improvements"
            }
            AgentType::Coordinator => {
                "Orchestrates multi-agent workflows, manages task dependencies, and coordinates execution"
            }
        }
    }

    fn capabilities(&self) -> &'static [&'static str] {
        match self {
            AgentType::Planner => &[
                "task_decomposition",
                "requirement_analysis",
                "work_breakdown_structure",
                "dependency_mapping",
                "priority_assignment",
                "resource_estimation",
            ],
            AgentType::Analyzer => &[
                "requirement_analysis",
                "technical_feasibility_assessment",
                "risk_identification",
                "dependency_analysis",
                "performance_analysis",
                "security_assessment",
                "architecture_review",
            ],
            AgentType::Developer => &[
                "code_implementation",
                "feature_development",
                "bug_fixing",
                "refactoring",
                "api_development",
                "database_design",
                "frontend_development",
                "backend_development",
            ],
            AgentType::Tester => &[
                "test_case_creation",
                "unit_testing",
                "integration_testing",
                "end_to_end_testing",
                "performance_testing",
                "quality_assurance",
            ],
            AgentType::Reviewer => &[
                "code_review",
                "quality_assessment",
                "security_review",
                "architecture_review",
                "documentation_review",
                "technical_debt_assessment",
            ],
            AgentType::Coordinator => &[
                "workflow_orchestration",
                "task_coordination",
                "dependency_management",
                "resource_allocation",
                "progress_monitoring",
                "agent_scheduling",
            ],
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_suggestion(s)
            .ok_or_else(|| Error::Validation(format!("Unknown agent type: {}", s)))
    }
}

/// Description of one agent type: what it does and how loaded it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub agent_type: AgentType,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Maximum tasks this agent type may run at once.
    #[serde(default = "default_capacity")]
    pub max_concurrent: usize,
    /// Tasks currently admitted to this agent type.
    #[serde(default)]
    pub active: usize,
    /// An unavailable agent never accepts work.
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_capacity() -> usize {
    DEFAULT_AGENT_CAPACITY
}

fn default_available() -> bool {
    true
}

impl AgentDescriptor {
    /// Standard descriptor for an agent type with the given capacity.
    pub fn standard(agent_type: AgentType, max_concurrent: usize) -> Self {
        Self {
            agent_type,
            name: agent_type.display_name().to_string(),
            description: agent_type.description().to_string(),
            capabilities: agent_type
                .capabilities()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            max_concurrent,
            active: 0,
            available: true,
        }
    }

    /// Free slots; zero when unavailable.
    pub fn free(&self) -> usize {
        if self.available {
            self.max_concurrent.saturating_sub(self.active)
        } else {
            0
        }
    }
}

/// What an assignment oracle sees about an agent type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_type: AgentType,
    pub description: String,
    pub capabilities: Vec<String>,
    pub current_workload: usize,
    pub available: bool,
}

/// Pool of typed agents with per-type capacity.
///
/// # Example
///
/// ```
/// use taskplan::orchestration::{AgentPool, AgentType};
///
/// let mut pool = AgentPool::standard(1);
/// assert!(pool.has_capacity(AgentType::Developer));
/// pool.acquire(AgentType::Developer).unwrap();
/// assert!(!pool.has_capacity(AgentType::Developer));
/// ```
#[derive(Debug, Clone)]
pub struct AgentPool {
    agents: BTreeMap<AgentType, AgentDescriptor>,
}

impl AgentPool {
    /// One standard agent per type, each with `capacity` slots.
    pub fn standard(capacity: usize) -> Self {
        Self {
            agents: AgentType::ALL
                .into_iter()
                .map(|t| (t, AgentDescriptor::standard(t, capacity)))
                .collect(),
        }
    }

    /// Build a pool from project descriptors.
    ///
    /// Types the project does not describe get a standard descriptor with
    /// `default_capacity`. Workload counters always start at zero.
    pub fn from_descriptors(descriptors: &[AgentDescriptor], default_capacity: usize) -> Self {
        let mut pool = Self::standard(default_capacity);
        for d in descriptors {
            let mut d = d.clone();
            d.active = 0;
            pool.agents.insert(d.agent_type, d);
        }
        pool
    }

    /// Override every agent's capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        for d in self.agents.values_mut() {
            d.max_concurrent = capacity;
        }
        self
    }

    pub fn get(&self, agent_type: AgentType) -> Option<&AgentDescriptor> {
        self.agents.get(&agent_type)
    }

    /// Set availability for an agent type.
    pub fn set_available(&mut self, agent_type: AgentType, available: bool) {
        if let Some(d) = self.agents.get_mut(&agent_type) {
            d.available = available;
        }
    }

    /// Check if the agent type can accept another task.
    pub fn has_capacity(&self, agent_type: AgentType) -> bool {
        self.agents
            .get(&agent_type)
            .map(|d| d.free() > 0)
            .unwrap_or(false)
    }

    /// Total free slots across all agent types.
    pub fn free_capacity(&self) -> usize {
        self.agents.values().map(AgentDescriptor::free).sum()
    }

    /// Take one slot from an agent type.
    ///
    /// # Errors
    ///
    /// `AgentNotAvailable` if the type is missing or unavailable,
    /// `AgentPoolFull` if it is at capacity.
    pub fn acquire(&mut self, agent_type: AgentType) -> Result<()> {
        let d = self
            .agents
            .get_mut(&agent_type)
            .filter(|d| d.available)
            .ok_or(Error::AgentNotAvailable(agent_type))?;
        if d.active >= d.max_concurrent {
            return Err(Error::AgentPoolFull {
                agent_type,
                max: d.max_concurrent,
            });
        }
        d.active += 1;
        Ok(())
    }

    /// Return one slot to an agent type. Never drops below zero.
    pub fn release(&mut self, agent_type: AgentType) {
        if let Some(d) = self.agents.get_mut(&agent_type) {
            d.active = d.active.saturating_sub(1);
        }
    }

    /// Tasks currently admitted to an agent type.
    pub fn active_count(&self, agent_type: AgentType) -> usize {
        self.agents.get(&agent_type).map(|d| d.active).unwrap_or(0)
    }

    /// Tasks currently admitted across all agent types.
    pub fn total_active(&self) -> usize {
        self.agents.values().map(|d| d.active).sum()
    }

    /// Live workload per agent type.
    pub fn workloads(&self) -> BTreeMap<AgentType, usize> {
        self.agents
            .iter()
            .map(|(t, d)| (*t, d.active))
            .collect()
    }

    /// Per-type summaries handed to the assignment oracle.
    pub fn summaries(&self) -> Vec<AgentSummary> {
        self.agents
            .values()
            .map(|d| AgentSummary {
                agent_type: d.agent_type,
                description: d.description.clone(),
                capabilities: d.capabilities.clone(),
                current_workload: d.active,
                available: d.available,
            })
            .collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.agents.values()
    }
}

impl Default for AgentPool {
    fn default() -> Self {
        Self::standard(DEFAULT_AGENT_CAPACITY)
    }
}
