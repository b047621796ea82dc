//! Agent selection for a single task.
//!
//! `AgentSelector` asks the assignment oracle which agent type should take
//! a task and maps the free-text answer onto [`AgentType`]. Anything
//! unrecognised, and any failed or timed-out call, degrades to the
//! selector's fallback type. One call is one decision: there are no
//! retries.

use crate::core::Task;
use crate::orchestration::oracle::{
    with_timeout, AssignmentOracle, AssignmentRequest, OracleOutcome, DEFAULT_ORACLE_TIMEOUT_SECS,
};
use crate::orchestration::pool::{AgentSummary, AgentType};
use crate::tplog_debug;
use std::sync::Arc;
use std::time::Duration;

/// Result of mapping an oracle suggestion onto an agent type.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentChoice {
    pub agent_type: AgentType,
    /// Oracle confidence, 0.0 for fallbacks.
    pub confidence: f64,
    /// False when the suggestion named no known type.
    pub recognized: bool,
}

impl AgentChoice {
    fn fallback(agent_type: AgentType) -> Self {
        Self {
            agent_type,
            confidence: 0.0,
            recognized: false,
        }
    }
}

/// Chooses agent types through an injected assignment oracle.
#[derive(Clone)]
pub struct AgentSelector {
    oracle: Arc<dyn AssignmentOracle>,
    fallback: AgentType,
    timeout: Duration,
}

impl AgentSelector {
    /// Selector with the `Developer` fallback and default timeout.
    pub fn new(oracle: Arc<dyn AssignmentOracle>) -> Self {
        Self {
            oracle,
            fallback: AgentType::Developer,
            timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
        }
    }

    pub fn with_fallback(mut self, fallback: AgentType) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn fallback(&self) -> AgentType {
        self.fallback
    }

    /// Choose an agent type for `task` given the live pool summaries.
    ///
    /// Never fails; `failure` on the outcome records a degraded decision.
    pub async fn select(&self, task: &Task, agents: &[AgentSummary]) -> OracleOutcome<AgentChoice> {
        let request = AssignmentRequest::from(task);
        let result = with_timeout(self.timeout, self.oracle.suggest_agent(&request, agents)).await;

        let result = result.map(|suggestion| match AgentType::parse_suggestion(&suggestion.agent_type) {
            Some(agent_type) => AgentChoice {
                agent_type,
                confidence: suggestion.confidence,
                recognized: true,
            },
            None => {
                tplog_debug!(
                    "Unrecognized agent suggestion '{}' for task {}, using {}",
                    suggestion.agent_type,
                    task.id,
                    self.fallback
                );
                AgentChoice::fallback(self.fallback)
            }
        });

        OracleOutcome::from_result(result, || AgentChoice::fallback(self.fallback))
    }
}

impl std::fmt::Debug for AgentSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSelector")
            .field("fallback", &self.fallback)
            .field("timeout", &self.timeout)
            .finish()
    }
}
