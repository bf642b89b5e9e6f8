//! The scheduler: dispatch, timeouts, retries, and cancellation.

use crate::agent::Agent;
use crate::config::OrchestratorConfig;
use crate::events::{EventBus, EventKind, OrchestratorEvent};
use crate::monitor::{AgentMonitor, AttemptOutcome};
use crate::task_queue::TaskQueue;
use crate::types::{Task, TaskKind, TaskOptions, TaskStatus, DEFAULT_MAX_RETRIES};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use ship_core::{Payload, ShipError, ShipResult};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Error recorded when an attempt outlives `task_timeout_ms`.
pub const TIMEOUT_ERROR: &str = "Task timeout";

/// Everything the orchestrator owns. Guarded by a single mutex that is never
/// held across an `.await` or while listeners run.
#[derive(Default)]
struct State {
    queue: TaskQueue,
    running: HashMap<Uuid, Task>,
    /// Failed attempts waiting out their retry delay.
    backoff: HashMap<Uuid, Task>,
    archive: HashMap<Uuid, Task>,
    agents: HashMap<TaskKind, Arc<dyn Agent>>,
    next_sequence: u64,
    /// Events in the order their state changes happened, not yet delivered.
    outbox: VecDeque<OrchestratorEvent>,
    /// Set while some thread is delivering the outbox.
    draining: bool,
}

impl State {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.running.is_empty() && self.backoff.is_empty()
    }

    fn find(&self, id: Uuid) -> Option<&Task> {
        self.running
            .get(&id)
            .or_else(|| self.archive.get(&id))
            .or_else(|| self.backoff.get(&id))
            .or_else(|| self.queue.get(id))
    }

    fn publish(&mut self, event: OrchestratorEvent) {
        self.outbox.push_back(event);
    }
}

struct Inner {
    config: OrchestratorConfig,
    state: Mutex<State>,
    events: EventBus,
    monitor: AgentMonitor,
    idle: Notify,
    runtime: Handle,
}

/// Aggregate counters returned by [`Orchestrator::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Tasks with an agent call in flight.
    pub running: usize,
    /// Tasks waiting for dispatch, including those waiting out a retry delay.
    pub queued: usize,
    /// Archived completed tasks.
    pub completed: usize,
    /// Archived failed tasks.
    pub failed: usize,
    /// Kinds with a registered agent, sorted.
    pub agents: Vec<TaskKind>,
}

/// Priority-queued, concurrency-bounded, retrying task scheduler.
///
/// Cloning is cheap and every clone drives the same queue. Agent calls run on
/// the Tokio runtime the orchestrator was created in, so the public methods may
/// be called from any thread.
///
/// Events are delivered in the order the state changes behind them happened,
/// whichever thread made the change.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Create an orchestrator bound to the current Tokio runtime.
    ///
    /// Fails if the config is invalid or no runtime is running.
    pub fn new(config: OrchestratorConfig) -> ShipResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            ShipError::Orchestrator(format!("Orchestrator requires a Tokio runtime: {e}"))
        })?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Create an orchestrator that spawns agent calls on the given runtime.
    pub fn with_runtime(config: OrchestratorConfig, runtime: Handle) -> Self {
        info!(
            max_concurrent_tasks = config.max_concurrent_tasks,
            retry_delay_ms = config.retry_delay_ms,
            task_timeout_ms = config.task_timeout_ms,
            "Orchestrator created"
        );
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State::default()),
                events: EventBus::default(),
                monitor: AgentMonitor::new(),
                idle: Notify::new(),
                runtime,
            }),
        }
    }

    /// Settings this orchestrator was built with.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Per-kind execution metrics.
    pub fn monitor(&self) -> &AgentMonitor {
        &self.inner.monitor
    }

    /// Register the handler for one task kind, replacing any previous one.
    pub fn register_agent(&self, agent: Arc<dyn Agent>) {
        let descriptor = agent.descriptor().clone();
        let replaced = {
            let mut state = self.inner.state.lock();
            let replaced = state.agents.insert(descriptor.kind, agent).is_some();
            state.publish(OrchestratorEvent::AgentRegistered(descriptor.clone()));
            replaced
        };

        if replaced {
            warn!(kind = %descriptor.kind, agent = %descriptor.name, "Replaced registered agent");
        } else {
            info!(kind = %descriptor.kind, agent = %descriptor.name, "Registered agent");
        }
        deliver_events(&self.inner);
    }

    /// Submit a task and start dispatching.
    ///
    /// Returns the task as created (status `pending`). Dispatch runs as a
    /// separate step on the runtime, so tasks submitted back-to-back are
    /// ordered by priority before the first one starts. A missing agent is not
    /// an error here; it surfaces as a failed task at dispatch time.
    pub fn create_task(&self, kind: TaskKind, input: Payload, options: TaskOptions) -> Task {
        let task = {
            let mut state = self.inner.state.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;

            let task = Task::new(kind, input)
                .with_priority(
                    options
                        .priority
                        .unwrap_or(self.inner.config.default_priority),
                )
                .with_max_retries(options.max_retries.unwrap_or(DEFAULT_MAX_RETRIES))
                .with_metadata(options.metadata)
                .with_sequence(sequence);
            state.publish(OrchestratorEvent::TaskCreated(task.clone()));
            state.queue.push(task.clone());
            task
        };

        info!(task_id = %task.id, kind = %task.kind, priority = %task.priority, "Task created");
        deliver_events(&self.inner);

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move { process_queue(&inner) });
        task
    }

    /// Validating entry point for untyped callers.
    ///
    /// Rejects an unknown kind or a non-object input; nothing is enqueued on
    /// error.
    pub fn create_task_from_json(
        &self,
        kind: &str,
        input: serde_json::Value,
        options: TaskOptions,
    ) -> ShipResult<Task> {
        let kind: TaskKind = kind.parse()?;
        let input = match input {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(ShipError::Validation(format!(
                    "Task input must be a JSON object, got {}",
                    json_type_name(&other)
                )))
            }
        };
        Ok(self.create_task(kind, input, options))
    }

    /// Cancel a task that has not started its current attempt.
    ///
    /// Only tasks still waiting (in the queue or in a retry delay) can be
    /// cancelled. Returns `false` for running, finished, or unknown tasks.
    pub fn cancel_task(&self, id: Uuid) -> bool {
        let cancelled = {
            let mut state = self.inner.state.lock();
            let waiting = match state.queue.remove(id) {
                Some(task) => Some(task),
                None => state.backoff.remove(&id),
            };
            match waiting {
                Some(mut task) => {
                    task.mark_cancelled();
                    state.archive.insert(id, task);
                    true
                }
                None => false,
            }
        };

        if cancelled {
            info!(task_id = %id, "Task cancelled");
            process_queue(&self.inner);
        } else {
            debug!(task_id = %id, "Cancel ignored, task is not waiting");
        }
        cancelled
    }

    /// Look a task up wherever it currently lives.
    pub fn get_task(&self, id: Uuid) -> Option<Task> {
        self.inner.state.lock().find(id).cloned()
    }

    /// Tasks currently in the given status.
    ///
    /// `running` reads the running set, `pending` and `queued` read the
    /// waiting tasks, terminal statuses read the archive.
    pub fn get_tasks_by_status(&self, status: TaskStatus) -> Vec<Task> {
        let state = self.inner.state.lock();
        let mut tasks: Vec<Task> = match status {
            TaskStatus::Running => state.running.values().cloned().collect(),
            TaskStatus::Pending => {
                return state
                    .queue
                    .with_status(status)
                    .into_iter()
                    .cloned()
                    .collect()
            }
            TaskStatus::Queued => {
                let mut delayed: Vec<Task> = state
                    .backoff
                    .values()
                    .filter(|t| t.status == status)
                    .cloned()
                    .collect();
                delayed.sort_by_key(|t| t.sequence);
                let mut waiting: Vec<Task> = state
                    .queue
                    .with_status(status)
                    .into_iter()
                    .cloned()
                    .collect();
                waiting.extend(delayed);
                return waiting;
            }
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => state
                .archive
                .values()
                .filter(|t| t.status == status)
                .cloned()
                .collect(),
        };
        tasks.sort_by_key(|t| t.sequence);
        tasks
    }

    /// Counts of running, waiting, and archived tasks.
    pub fn status(&self) -> OrchestratorStatus {
        let state = self.inner.state.lock();
        let count = |status: TaskStatus| state.archive.values().filter(|t| t.status == status).count();
        let mut agents: Vec<TaskKind> = state.agents.keys().copied().collect();
        agents.sort();

        OrchestratorStatus {
            running: state.running.len(),
            queued: state.queue.len() + state.backoff.len(),
            completed: count(TaskStatus::Completed),
            failed: count(TaskStatus::Failed),
            agents,
        }
    }

    /// True when nothing is queued, running, or waiting out a retry delay.
    pub fn is_idle(&self) -> bool {
        self.inner.state.lock().is_idle()
    }

    /// Resolve once the orchestrator is idle.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Register a synchronous listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, listener);
    }

    /// Register a synchronous listener for every event.
    pub fn on_any<F>(&self, listener: F)
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        self.inner.events.on_any(listener);
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.inner.events.subscribe()
    }
}

/// Dispatch queued tasks while concurrency slots are free.
fn process_queue(inner: &Arc<Inner>) {
    let mut launches = Vec::new();

    let idle = {
        let mut state = inner.state.lock();
        while state.running.len() < inner.config.max_concurrent_tasks {
            let Some(mut task) = state.queue.pop_front() else {
                break;
            };

            match state.agents.get(&task.kind).cloned() {
                Some(agent) => {
                    task.mark_running();
                    info!(task_id = %task.id, kind = %task.kind, attempt = task.retries + 1, "Task started");
                    launches.push((task.id, task.kind, task.input.clone(), agent));
                    state.publish(OrchestratorEvent::TaskStarted(task.clone()));
                    state.running.insert(task.id, task);
                }
                None => {
                    let message = format!("No agent registered for task type: {}", task.kind);
                    error!(task_id = %task.id, kind = %task.kind, "{message}");
                    task.mark_failed(message.clone());
                    inner.monitor.record_unroutable(task.kind);
                    state.publish(OrchestratorEvent::TaskFailed {
                        task: task.clone(),
                        error: message,
                    });
                    state.archive.insert(task.id, task);
                }
            }
        }
        let idle = state.is_idle();
        if idle {
            state.publish(OrchestratorEvent::QueueEmpty);
        }
        idle
    };

    deliver_events(inner);
    if idle {
        inner.idle.notify_waiters();
    }

    for (id, kind, input, agent) in launches {
        let worker = Arc::clone(inner);
        inner
            .runtime
            .spawn(async move { run_attempt(worker, id, kind, input, agent).await });
    }
}

/// Run one attempt, racing the agent against the task timeout.
///
/// The agent call runs on its own task. On timeout it is left running and its
/// result is dropped.
async fn run_attempt(
    inner: Arc<Inner>,
    id: Uuid,
    kind: TaskKind,
    input: Payload,
    agent: Arc<dyn Agent>,
) {
    inner.monitor.record_attempt(kind);
    let start = Instant::now();
    let execution = inner
        .runtime
        .spawn(async move { agent.execute(input).await });

    let result = match tokio::time::timeout(inner.config.task_timeout(), execution).await {
        Ok(joined) => {
            inner
                .monitor
                .record_duration(kind, start.elapsed().as_millis() as u64);
            match joined {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(e)) => Err(e.to_string()),
                Err(join_error) => Err(format!("Agent panicked: {join_error}")),
            }
        }
        Err(_) => {
            inner.monitor.record_timeout(kind);
            Err(TIMEOUT_ERROR.to_string())
        }
    };

    finish_attempt(&inner, id, result);
}

/// Record an attempt's result, then schedule a retry or archive the task.
fn finish_attempt(inner: &Arc<Inner>, id: Uuid, result: Result<Payload, String>) {
    let mut retry_after = None;

    {
        let mut state = inner.state.lock();
        let Some(mut task) = state.running.remove(&id) else {
            return;
        };

        match result {
            Ok(output) => {
                task.mark_completed(output);
                inner
                    .monitor
                    .record_outcome(task.kind, AttemptOutcome::Completed);
                info!(task_id = %id, kind = %task.kind, "Task completed");
                state.publish(OrchestratorEvent::TaskCompleted(task.clone()));
                state.archive.insert(id, task);
            }
            Err(message) if task.can_retry() => {
                let attempt = task.mark_retrying();
                let delay = inner.config.backoff_for(attempt);
                inner
                    .monitor
                    .record_outcome(task.kind, AttemptOutcome::Retried);
                warn!(
                    task_id = %id,
                    kind = %task.kind,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "Task attempt failed, retrying"
                );
                state.publish(OrchestratorEvent::TaskRetrying {
                    task: task.clone(),
                    attempt,
                });
                state.backoff.insert(id, task);
                retry_after = Some(delay);
            }
            Err(message) => {
                task.mark_failed(message.clone());
                inner
                    .monitor
                    .record_outcome(task.kind, AttemptOutcome::Failed);
                error!(
                    task_id = %id,
                    kind = %task.kind,
                    retries = task.retries,
                    error = %message,
                    "Task failed"
                );
                state.publish(OrchestratorEvent::TaskFailed {
                    task: task.clone(),
                    error: message,
                });
                state.archive.insert(id, task);
            }
        }
    }

    deliver_events(inner);

    if let Some(delay) = retry_after {
        let worker = Arc::clone(inner);
        inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            requeue(&worker, id);
        });
    }

    process_queue(inner);
}

/// Deliver queued events, in order, with no lock held.
///
/// Only one thread drains at a time. A caller that finds a drain in progress
/// (another thread, or a listener re-entering the orchestrator) leaves its
/// events for that drain, which runs until the outbox is empty.
fn deliver_events(inner: &Arc<Inner>) {
    {
        let mut state = inner.state.lock();
        if state.draining {
            return;
        }
        state.draining = true;
    }

    let _drain = DrainGuard(inner);
    loop {
        let next = {
            let mut state = inner.state.lock();
            let next = state.outbox.pop_front();
            if next.is_none() {
                state.draining = false;
            }
            next
        };
        match next {
            Some(event) => inner.events.emit(event),
            None => break,
        }
    }
}

/// Releases the drain flag if a listener panics mid-delivery.
struct DrainGuard<'a>(&'a Arc<Inner>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.state.lock().draining = false;
        }
    }
}

/// Move a task out of its retry delay and back into the queue.
fn requeue(inner: &Arc<Inner>, id: Uuid) {
    let requeued = {
        let mut state = inner.state.lock();
        match state.backoff.remove(&id) {
            Some(task) => {
                state.queue.push(task);
                true
            }
            None => false,
        }
    };

    if requeued {
        debug!(task_id = %id, "Task re-queued after retry delay");
        process_queue(inner);
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
