//! Per-agent call statistics.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

/// Counters for one remote agent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentStats {
    /// Calls issued.
    pub total_requests: u64,
    /// Calls that returned a task.
    pub tasks: u64,
    /// Calls answered without a task.
    pub no_result: u64,
    /// Calls that failed hard.
    pub failures: u64,
    /// Consecutive hard failures.
    pub consecutive_failures: u32,
    /// Moving average latency in milliseconds.
    pub avg_latency_ms: Option<u64>,
}

impl AgentStats {
    fn record_latency(&mut self, latency: Duration) {
        let latency_ms = latency.as_millis() as u64;
        self.avg_latency_ms = Some(match self.avg_latency_ms {
            Some(avg) => (avg as f64 * 0.9 + latency_ms as f64 * 0.1) as u64,
            None => latency_ms,
        });
    }
}

/// How a single call ended, for accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Task,
    NoResult,
    Failure,
}

/// Statistics for every agent the orchestrator has called.
#[derive(Debug, Clone, Default)]
pub struct CallStats {
    agents: BTreeMap<String, AgentStats>,
    workflows_completed: u64,
    workflows_failed: u64,
}

impl CallStats {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call.
    pub fn record(&mut self, agent_name: &str, outcome: CallOutcome, latency: Duration) {
        let stats = self.agents.entry(agent_name.to_string()).or_default();
        stats.total_requests += 1;
        match outcome {
            CallOutcome::Task => {
                stats.tasks += 1;
                stats.consecutive_failures = 0;
                stats.record_latency(latency);
            }
            CallOutcome::NoResult => {
                stats.no_result += 1;
                stats.consecutive_failures = 0;
                stats.record_latency(latency);
            }
            CallOutcome::Failure => {
                stats.failures += 1;
                stats.consecutive_failures += 1;
            }
        }
    }

    /// Record the end of a workflow run.
    pub fn record_workflow(&mut self, completed: bool) {
        if completed {
            self.workflows_completed += 1;
        } else {
            self.workflows_failed += 1;
        }
    }

    /// Statistics for one agent.
    pub fn agent(&self, agent_name: &str) -> Option<&AgentStats> {
        self.agents.get(agent_name)
    }

    /// Statistics for all agents, by name.
    pub fn agents(&self) -> &BTreeMap<String, AgentStats> {
        &self.agents
    }

    /// Completed and failed workflow counts.
    pub fn workflow_counts(&self) -> (u64, u64) {
        (self.workflows_completed, self.workflows_failed)
    }
}
