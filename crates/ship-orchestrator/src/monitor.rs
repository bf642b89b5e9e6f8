//! Per-kind execution counters.

use crate::types::TaskKind;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Counters tracked per task kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindMetrics {
    /// Agent invocations, retries included.
    pub attempts: u64,
    /// Attempts that produced output.
    pub completed: u64,
    /// Terminal failures, no-agent failures included.
    pub failed: u64,
    /// Failed attempts that were retried.
    pub retried: u64,
    /// Attempts cut off by the task timeout.
    pub timeouts: u64,
    /// Wall time spent in agent calls that settled before the timeout.
    pub duration_ms: u64,
}

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Agent returned output.
    Completed,
    /// Attempt failed, retry scheduled.
    Retried,
    /// Attempt failed, retries exhausted.
    Failed,
}

/// Tracks execution metrics for every task kind the orchestrator has seen.
pub struct AgentMonitor {
    metrics: RwLock<HashMap<TaskKind, KindMetrics>>,
}

impl AgentMonitor {
    /// Empty monitor.
    pub fn new() -> Self {
        Self {
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// Count an agent invocation.
    pub fn record_attempt(&self, kind: TaskKind) {
        self.metrics.write().entry(kind).or_default().attempts += 1;
    }

    /// Count a task failed without ever reaching an agent.
    pub fn record_unroutable(&self, kind: TaskKind) {
        self.metrics.write().entry(kind).or_default().failed += 1;
    }

    /// Count an attempt that hit the timeout.
    pub fn record_timeout(&self, kind: TaskKind) {
        self.metrics.write().entry(kind).or_default().timeouts += 1;
    }

    /// Add agent wall time for a settled attempt.
    pub fn record_duration(&self, kind: TaskKind, duration_ms: u64) {
        let mut metrics = self.metrics.write();
        let entry = metrics.entry(kind).or_default();
        entry.duration_ms = entry.duration_ms.saturating_add(duration_ms);
    }

    /// Count how an attempt ended.
    pub fn record_outcome(&self, kind: TaskKind, outcome: AttemptOutcome) {
        let mut metrics = self.metrics.write();
        let entry = metrics.entry(kind).or_default();
        match outcome {
            AttemptOutcome::Completed => entry.completed += 1,
            AttemptOutcome::Retried => entry.retried += 1,
            AttemptOutcome::Failed => entry.failed += 1,
        }
    }

    /// Metrics for one kind, if it has been seen.
    pub fn get(&self, kind: TaskKind) -> Option<KindMetrics> {
        self.metrics.read().get(&kind).cloned()
    }

    /// Per-kind metrics, sorted by kind.
    pub fn snapshot(&self) -> Vec<(TaskKind, KindMetrics)> {
        let mut all: Vec<(TaskKind, KindMetrics)> = self
            .metrics
            .read()
            .iter()
            .map(|(k, m)| (*k, m.clone()))
            .collect();
        all.sort_by_key(|(k, _)| *k);
        all
    }

    /// Sum over every kind.
    pub fn aggregate(&self) -> KindMetrics {
        let metrics = self.metrics.read();
        let mut total = KindMetrics::default();
        for m in metrics.values() {
            total.attempts += m.attempts;
            total.completed += m.completed;
            total.failed += m.failed;
            total.retried += m.retried;
            total.timeouts += m.timeouts;
            total.duration_ms = total.duration_ms.saturating_add(m.duration_ms);
        }
        total
    }

    /// Per-kind metrics and their aggregate as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        let kinds: serde_json::Map<String, serde_json::Value> = self
            .snapshot()
            .into_iter()
            .map(|(k, m)| (k.to_string(), serde_json::json!(m)))
            .collect();
        serde_json::json!({
            "kinds": kinds,
            "aggregate": self.aggregate(),
        })
    }
}

impl Default for AgentMonitor {
    fn default() -> Self {
        Self::new()
    }
}
