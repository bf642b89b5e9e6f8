//! Scheduler settings.

use crate::types::TaskPriority;
use serde::{Deserialize, Serialize};
use ship_core::{ShipError, ShipResult};
use std::time::Duration;

/// Tunables for an [`Orchestrator`](crate::Orchestrator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on tasks running at once.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    /// Priority given to tasks created without one.
    #[serde(default)]
    pub default_priority: TaskPriority,
    /// Base retry delay; the n-th retry waits `n * retry_delay_ms`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// How long a single attempt may run before it counts as failed.
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
}

fn default_max_concurrent_tasks() -> usize {
    5
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_task_timeout_ms() -> u64 {
    300_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            default_priority: TaskPriority::default(),
            retry_delay_ms: default_retry_delay_ms(),
            task_timeout_ms: default_task_timeout_ms(),
        }
    }
}

impl OrchestratorConfig {
    /// Set `max_concurrent_tasks`.
    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    /// Set `default_priority`.
    pub fn with_default_priority(mut self, priority: TaskPriority) -> Self {
        self.default_priority = priority;
        self
    }

    /// Set `retry_delay_ms`.
    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    /// Set `task_timeout_ms`.
    pub fn with_task_timeout_ms(mut self, ms: u64) -> Self {
        self.task_timeout_ms = ms;
        self
    }

    /// Base retry delay.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Delay before the given retry attempt (1-based) is re-queued.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(u64::from(attempt)))
    }

    /// Per-attempt time limit.
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    /// Reject settings the dispatch loop cannot work with.
    pub fn validate(&self) -> ShipResult<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(ShipError::Config(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.task_timeout_ms == 0 {
            return Err(ShipError::Config(
                "task_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
