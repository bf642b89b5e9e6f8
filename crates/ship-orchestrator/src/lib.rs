//! Task orchestration engine with a priority queue, retries, and lifecycle events.
//!
//! Callers register one [`Agent`] per [`TaskKind`] and submit tasks. The
//! [`Orchestrator`] dispatches them in priority order under a concurrency
//! limit, races each attempt against a timeout, retries failures with linear
//! backoff, and reports every transition as an [`OrchestratorEvent`].
//!
//! # Main types
//!
//! - [`Orchestrator`]: Owns the queue, agent registry, running set, and archive.
//! - [`TaskQueue`]: Priority-then-FIFO ordered list of waiting tasks.
//! - [`Agent`]: Capability trait implemented by task handlers.
//! - [`EventBus`]: Listener registry and broadcast channel for events.
//! - [`AgentMonitor`]: Per-kind attempt, failure, and timing counters.
//! - [`OrchestratorConfig`]: Concurrency, priority, retry, and timeout settings.

/// Agent capability trait and descriptor.
pub mod agent;
/// Orchestrator configuration.
pub mod config;
/// Scheduler: admission, dispatch, timeout, retry, and queries.
pub mod engine;
/// Lifecycle events and listener registry.
pub mod events;
/// Per-kind execution metrics.
pub mod monitor;
/// Priority task queue.
pub mod task_queue;
/// Task model (Task, TaskKind, TaskStatus, TaskPriority, TaskOptions).
pub mod types;

pub use agent::{Agent, AgentDescriptor};
pub use config::OrchestratorConfig;
pub use engine::{Orchestrator, OrchestratorStatus, TIMEOUT_ERROR};
pub use events::{EventBus, EventKind, Listener, OrchestratorEvent};
pub use monitor::{AgentMonitor, AttemptOutcome, KindMetrics};
pub use task_queue::TaskQueue;
pub use types::{Task, TaskKind, TaskOptions, TaskPriority, TaskStatus, DEFAULT_MAX_RETRIES};
