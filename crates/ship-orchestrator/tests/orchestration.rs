//! Scheduling behaviour of the orchestrator, driven through its public API.
//!
//! Timing-sensitive tests run on a paused Tokio clock so delays and timeouts
//! advance virtually.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use parking_lot::Mutex;
use ship_core::{Payload, ShipError, ShipResult};
use ship_orchestrator::*;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Test agents
// ---------------------------------------------------------------------------

/// Sleeps, then echoes its input. Tracks how many calls overlap.
struct SleepyAgent {
    descriptor: AgentDescriptor,
    delay: Duration,
    calls: AtomicU32,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SleepyAgent {
    fn new(kind: TaskKind, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            descriptor: AgentDescriptor::new("sleepy", kind, "Sleeps then echoes"),
            delay: Duration::from_millis(delay_ms),
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Agent for SleepyAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Payload) -> ShipResult<Payload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(input)
    }
}

/// Fails the first `failures` calls with `message`, then echoes its input.
struct FlakyAgent {
    descriptor: AgentDescriptor,
    failures: u32,
    message: String,
    calls: AtomicU32,
    inputs: Mutex<Vec<Payload>>,
}

impl FlakyAgent {
    fn new(kind: TaskKind, failures: u32, message: &str) -> Arc<Self> {
        Arc::new(Self {
            descriptor: AgentDescriptor::new("flaky", kind, "Fails a few times"),
            failures,
            message: message.to_string(),
            calls: AtomicU32::new(0),
            inputs: Mutex::new(Vec::new()),
        })
    }

    fn always_failing(kind: TaskKind, message: &str) -> Arc<Self> {
        Self::new(kind, u32::MAX, message)
    }
}

#[async_trait]
impl Agent for FlakyAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Payload) -> ShipResult<Payload> {
        self.inputs.lock().push(input.clone());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(ShipError::execution(self.message.clone()))
        } else {
            Ok(input)
        }
    }
}

/// Panics on every call.
struct PanickingAgent {
    descriptor: AgentDescriptor,
    calls: AtomicU32,
}

impl PanickingAgent {
    fn new(kind: TaskKind) -> Arc<Self> {
        Arc::new(Self {
            descriptor: AgentDescriptor::new("panicky", kind, "Always panics"),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Agent for PanickingAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _input: Payload) -> ShipResult<Payload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("agent blew up");
    }
}

/// Returns a fixed output naming the agent.
struct NamedAgent {
    descriptor: AgentDescriptor,
}

impl NamedAgent {
    fn new(kind: TaskKind, name: &str) -> Arc<Self> {
        Arc::new(Self {
            descriptor: AgentDescriptor::new(name, kind, "Reports its name"),
        })
    }
}

#[async_trait]
impl Agent for NamedAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _input: Payload) -> ShipResult<Payload> {
        let mut out = Payload::new();
        out.insert("by".to_string(), self.descriptor.name.clone().into());
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn orchestrator(config: OrchestratorConfig) -> Orchestrator {
    Orchestrator::new(config).unwrap()
}

fn serial() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_max_concurrent_tasks(1)
        .with_retry_delay_ms(10)
}

fn labelled(label: &str) -> Payload {
    let mut input = Payload::new();
    input.insert("label".to_string(), label.into());
    input
}

fn label_of(task: &Task) -> String {
    task.input["label"].as_str().unwrap().to_string()
}

fn record(orchestrator: &Orchestrator) -> Arc<Mutex<Vec<OrchestratorEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    orchestrator.on_any(move |event| sink.lock().push(event.clone()));
    events
}

fn completed_labels(events: &[OrchestratorEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::TaskCompleted(task) => Some(label_of(task)),
            _ => None,
        })
        .collect()
}

fn started_labels(events: &[OrchestratorEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::TaskStarted(task) => Some(label_of(task)),
            _ => None,
        })
        .collect()
}

fn count_kind(events: &[OrchestratorEvent], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind() == kind).count()
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn completes_by_priority_with_single_slot() {
    let orch = orchestrator(serial());
    orch.register_agent(SleepyAgent::new(TaskKind::Issue, 10));
    let events = record(&orch);

    orch.create_task(
        TaskKind::Issue,
        labelled("low"),
        TaskOptions::new().with_priority(TaskPriority::Low),
    );
    orch.create_task(
        TaskKind::Issue,
        labelled("critical"),
        TaskOptions::new().with_priority(TaskPriority::Critical),
    );
    orch.create_task(
        TaskKind::Issue,
        labelled("medium"),
        TaskOptions::new().with_priority(TaskPriority::Medium),
    );

    orch.wait_until_idle().await;
    assert_eq!(
        completed_labels(&events.lock()),
        vec!["critical", "medium", "low"]
    );
}

#[tokio::test(start_paused = true)]
async fn high_dispatches_before_low_in_either_order() {
    for high_first in [true, false] {
        let orch = orchestrator(serial());
        orch.register_agent(SleepyAgent::new(TaskKind::Review, 5));
        let events = record(&orch);

        let mut submissions = vec![("high", TaskPriority::High), ("low", TaskPriority::Low)];
        if !high_first {
            submissions.reverse();
        }
        for (label, priority) in submissions {
            orch.create_task(
                TaskKind::Review,
                labelled(label),
                TaskOptions::new().with_priority(priority),
            );
        }

        orch.wait_until_idle().await;
        assert_eq!(completed_labels(&events.lock()), vec!["high", "low"]);
    }
}

#[tokio::test(start_paused = true)]
async fn same_priority_is_first_in_first_out() {
    let orch = orchestrator(serial());
    orch.register_agent(SleepyAgent::new(TaskKind::Security, 5));
    let events = record(&orch);

    for label in ["a", "b", "c", "d"] {
        orch.create_task(TaskKind::Security, labelled(label), TaskOptions::new());
    }

    orch.wait_until_idle().await;
    assert_eq!(completed_labels(&events.lock()), vec!["a", "b", "c", "d"]);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn never_exceeds_concurrency_limit() {
    let orch = orchestrator(OrchestratorConfig::default().with_max_concurrent_tasks(2));
    let agent = SleepyAgent::new(TaskKind::Issue, 50);
    orch.register_agent(agent.clone());

    let observed_running = Arc::new(AtomicUsize::new(0));
    let watcher = orch.clone();
    let peak = observed_running.clone();
    orch.on(EventKind::TaskStarted, move |_| {
        peak.fetch_max(watcher.status().running, Ordering::SeqCst);
    });

    for i in 0..6 {
        orch.create_task(TaskKind::Issue, labelled(&i.to_string()), TaskOptions::new());
    }

    orch.wait_until_idle().await;
    assert_eq!(agent.calls.load(Ordering::SeqCst), 6);
    assert_eq!(agent.peak.load(Ordering::SeqCst), 2);
    assert!(observed_running.load(Ordering::SeqCst) <= 2);
    assert_eq!(orch.status().completed, 6);
}

// ---------------------------------------------------------------------------
// Retries, backoff, timeouts
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn always_failing_agent_retries_then_fails_with_last_error() {
    let orch = orchestrator(serial());
    let agent = FlakyAgent::always_failing(TaskKind::Issue, "boom");
    orch.register_agent(agent.clone());
    let events = record(&orch);

    let task = orch.create_task(
        TaskKind::Issue,
        labelled("doomed"),
        TaskOptions::new().with_max_retries(2),
    );
    orch.wait_until_idle().await;

    let events = events.lock();
    let attempts: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::TaskRetrying { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2]);

    let failures: Vec<&String> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::TaskFailed { error, .. } => Some(error),
            _ => None,
        })
        .collect();
    assert_eq!(failures, vec!["boom"]);

    let last_retry = events
        .iter()
        .rposition(|e| e.kind() == EventKind::TaskRetrying)
        .unwrap();
    let failed_at = events
        .iter()
        .position(|e| e.kind() == EventKind::TaskFailed)
        .unwrap();
    assert!(last_retry < failed_at);

    let task = orch.get_task(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some("boom"));
    assert!(task.output.is_none());
    assert_eq!(task.retries, 2);
    assert_eq!(agent.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn default_ceiling_allows_four_attempts() {
    let orch = orchestrator(serial());
    let agent = FlakyAgent::always_failing(TaskKind::Feedback, "nope");
    orch.register_agent(agent.clone());

    let task = orch.create_task(TaskKind::Feedback, Payload::new(), TaskOptions::new());
    orch.wait_until_idle().await;

    let task = orch.get_task(task.id).unwrap();
    assert_eq!(task.retries, DEFAULT_MAX_RETRIES);
    assert_eq!(agent.calls.load(Ordering::SeqCst), DEFAULT_MAX_RETRIES + 1);
    assert_eq!(orch.status().failed, 1);
}

#[tokio::test(start_paused = true)]
async fn zero_retries_fails_on_first_error() {
    let orch = orchestrator(serial());
    let agent = FlakyAgent::always_failing(TaskKind::Issue, "once");
    orch.register_agent(agent.clone());
    let events = record(&orch);

    orch.create_task(
        TaskKind::Issue,
        Payload::new(),
        TaskOptions::new().with_max_retries(0),
    );
    orch.wait_until_idle().await;

    assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
    assert_eq!(count_kind(&events.lock(), EventKind::TaskRetrying), 0);
    assert_eq!(count_kind(&events.lock(), EventKind::TaskFailed), 1);
}

#[tokio::test(start_paused = true)]
async fn flaky_agent_eventually_completes_with_same_input() {
    let orch = orchestrator(serial());
    let agent = FlakyAgent::new(TaskKind::Review, 2, "transient");
    orch.register_agent(agent.clone());

    let task = orch.create_task(TaskKind::Review, labelled("pr-7"), TaskOptions::new());
    orch.wait_until_idle().await;

    let task = orch.get_task(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.retries, 2);
    assert!(task.error.is_none());
    assert_eq!(task.output.unwrap()["label"], "pr-7");

    let inputs = agent.inputs.lock();
    assert_eq!(inputs.len(), 3);
    assert!(inputs.iter().all(|i| i == &labelled("pr-7")));
}

#[tokio::test(start_paused = true)]
async fn retried_task_keeps_its_place_ahead_of_newer_work() {
    let orch = orchestrator(serial());
    orch.register_agent(FlakyAgent::new(TaskKind::Review, 1, "flaky"));
    orch.register_agent(SleepyAgent::new(TaskKind::Issue, 50));
    let events = record(&orch);

    let older = orch.create_task(TaskKind::Review, labelled("older"), TaskOptions::new());
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(orch.get_task(older.id).unwrap().status, TaskStatus::Queued);

    // Holds the only slot while the retry delay runs out.
    orch.create_task(TaskKind::Issue, labelled("blocker"), TaskOptions::new());
    tokio::time::sleep(Duration::from_millis(1)).await;
    orch.create_task(TaskKind::Review, labelled("newer"), TaskOptions::new());

    orch.wait_until_idle().await;
    assert_eq!(
        started_labels(&events.lock()),
        vec!["older", "blocker", "older", "newer"]
    );
    assert_eq!(orch.get_task(older.id).unwrap().created_at, older.created_at);
}

#[tokio::test(start_paused = true)]
async fn backoff_grows_linearly() {
    let config = OrchestratorConfig::default()
        .with_max_concurrent_tasks(1)
        .with_retry_delay_ms(1000);
    let orch = orchestrator(config);
    orch.register_agent(FlakyAgent::always_failing(TaskKind::Deploy, "down"));

    let starts = Arc::new(Mutex::new(Vec::new()));
    let sink = starts.clone();
    orch.on(EventKind::TaskStarted, move |_| {
        sink.lock().push(tokio::time::Instant::now());
    });

    orch.create_task(
        TaskKind::Deploy,
        Payload::new(),
        TaskOptions::new().with_max_retries(2),
    );
    orch.wait_until_idle().await;

    let starts = starts.lock();
    assert_eq!(starts.len(), 3);
    assert!(starts[1] - starts[0] >= Duration::from_millis(1000));
    assert!(starts[2] - starts[1] >= Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn timeout_counts_as_failed_attempt() {
    let config = OrchestratorConfig::default()
        .with_task_timeout_ms(100)
        .with_retry_delay_ms(10);
    let orch = orchestrator(config);
    let agent = SleepyAgent::new(TaskKind::Security, 10_000);
    orch.register_agent(agent.clone());
    let events = record(&orch);

    let task = orch.create_task(
        TaskKind::Security,
        Payload::new(),
        TaskOptions::new().with_max_retries(1),
    );
    orch.wait_until_idle().await;

    let task = orch.get_task(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some(TIMEOUT_ERROR));
    assert_eq!(task.retries, 1);
    assert_eq!(count_kind(&events.lock(), EventKind::TaskRetrying), 1);
    assert_eq!(agent.calls.load(Ordering::SeqCst), 2);

    let metrics = orch.monitor().get(TaskKind::Security).unwrap();
    assert_eq!(metrics.timeouts, 2);
    assert_eq!(metrics.attempts, 2);
    assert_eq!(metrics.failed, 1);
}

// ---------------------------------------------------------------------------
// Missing agents
// ---------------------------------------------------------------------------

#[tokio::test]
async fn panicking_agent_is_a_failed_attempt() {
    let orch = orchestrator(serial().with_retry_delay_ms(1));
    let agent = PanickingAgent::new(TaskKind::Security);
    orch.register_agent(agent.clone());
    orch.register_agent(NamedAgent::new(TaskKind::Issue, "planner"));

    let doomed = orch.create_task(
        TaskKind::Security,
        Payload::new(),
        TaskOptions::new().with_max_retries(1),
    );
    let after = orch.create_task(TaskKind::Issue, Payload::new(), TaskOptions::new());
    orch.wait_until_idle().await;

    let doomed = orch.get_task(doomed.id).unwrap();
    assert_eq!(doomed.status, TaskStatus::Failed);
    assert_eq!(doomed.retries, 1);
    assert!(doomed.error.unwrap().starts_with("Agent panicked"));
    assert_eq!(agent.calls.load(Ordering::SeqCst), 2);
    assert_eq!(orch.get_task(after.id).unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn missing_agent_fails_fast_without_retries() {
    let orch = orchestrator(OrchestratorConfig::default());
    let events = record(&orch);

    let task = orch.create_task(TaskKind::Deploy, Payload::new(), TaskOptions::new());
    assert_eq!(task.status, TaskStatus::Pending);
    orch.wait_until_idle().await;

    let task = orch.get_task(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(
        task.error.as_deref(),
        Some("No agent registered for task type: deploy")
    );
    assert_eq!(task.retries, 0);
    assert!(task.completed_at.is_some());

    let events = events.lock();
    assert_eq!(count_kind(&events, EventKind::TaskStarted), 0);
    assert_eq!(count_kind(&events, EventKind::TaskRetrying), 0);
    assert_eq!(count_kind(&events, EventKind::TaskFailed), 1);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancels_only_waiting_tasks() {
    let orch = orchestrator(serial());
    let agent = SleepyAgent::new(TaskKind::Issue, 100);
    orch.register_agent(agent.clone());

    let first = orch.create_task(TaskKind::Issue, labelled("first"), TaskOptions::new());
    let second = orch.create_task(TaskKind::Issue, labelled("second"), TaskOptions::new());
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(orch.get_task(first.id).unwrap().status, TaskStatus::Running);
    assert!(orch.cancel_task(second.id));
    assert!(!orch.cancel_task(first.id));

    orch.wait_until_idle().await;
    assert!(!orch.cancel_task(first.id));
    assert!(!orch.cancel_task(second.id));

    let cancelled = orch.get_task(second.id).unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());
    assert!(cancelled.started_at.is_none());
    assert_eq!(orch.get_tasks_by_status(TaskStatus::Cancelled).len(), 1);
    assert_eq!(
        orch.get_task(first.id).unwrap().status,
        TaskStatus::Completed
    );
    assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn cancels_task_waiting_out_retry_delay() {
    let config = OrchestratorConfig::default().with_retry_delay_ms(1000);
    let orch = orchestrator(config);
    let agent = FlakyAgent::always_failing(TaskKind::Review, "flap");
    orch.register_agent(agent.clone());
    let mut rx = orch.subscribe();

    let task = orch.create_task(TaskKind::Review, Payload::new(), TaskOptions::new());
    loop {
        if let OrchestratorEvent::TaskRetrying { .. } = rx.recv().await.unwrap() {
            break;
        }
    }

    assert_eq!(orch.get_task(task.id).unwrap().status, TaskStatus::Queued);
    assert_eq!(orch.get_tasks_by_status(TaskStatus::Queued).len(), 1);
    assert_eq!(orch.status().queued, 1);
    assert!(orch.cancel_task(task.id));

    orch.wait_until_idle().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let task = orch.get_task(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(task.retries, 1);
    assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Registration, queries, events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn last_registration_wins() {
    let orch = orchestrator(OrchestratorConfig::default());
    let events = record(&orch);
    orch.register_agent(NamedAgent::new(TaskKind::Feedback, "first"));
    orch.register_agent(NamedAgent::new(TaskKind::Feedback, "second"));

    let task = orch.create_task(TaskKind::Feedback, Payload::new(), TaskOptions::new());
    orch.wait_until_idle().await;

    let task = orch.get_task(task.id).unwrap();
    assert_eq!(task.output.unwrap()["by"], "second");
    assert_eq!(count_kind(&events.lock(), EventKind::AgentRegistered), 2);
    assert_eq!(orch.status().agents, vec![TaskKind::Feedback]);
}

#[tokio::test(start_paused = true)]
async fn status_queries_follow_task_location() {
    let orch = orchestrator(serial());
    orch.register_agent(SleepyAgent::new(TaskKind::Issue, 100));

    let a = orch.create_task(TaskKind::Issue, labelled("a"), TaskOptions::new());
    let b = orch.create_task(TaskKind::Issue, labelled("b"), TaskOptions::new());
    tokio::time::sleep(Duration::from_millis(1)).await;

    let running = orch.get_tasks_by_status(TaskStatus::Running);
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].id, a.id);
    let pending = orch.get_tasks_by_status(TaskStatus::Pending);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, b.id);

    let status = orch.status();
    assert_eq!(status.running, 1);
    assert_eq!(status.queued, 1);
    assert_eq!(status.completed, 0);

    orch.wait_until_idle().await;
    assert!(orch.get_tasks_by_status(TaskStatus::Running).is_empty());
    assert!(orch.get_tasks_by_status(TaskStatus::Pending).is_empty());
    let completed = orch.get_tasks_by_status(TaskStatus::Completed);
    assert_eq!(
        completed.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![a.id, b.id]
    );
    assert_eq!(orch.status().completed, 2);
}

#[tokio::test]
async fn archived_tasks_are_not_touched_by_later_passes() {
    let orch = orchestrator(OrchestratorConfig::default());
    orch.register_agent(NamedAgent::new(TaskKind::Issue, "worker"));

    let first = orch.create_task(TaskKind::Issue, Payload::new(), TaskOptions::new());
    orch.wait_until_idle().await;
    let archived = orch.get_task(first.id).unwrap();

    for _ in 0..3 {
        orch.create_task(TaskKind::Issue, Payload::new(), TaskOptions::new());
    }
    orch.create_task(TaskKind::Deploy, Payload::new(), TaskOptions::new());
    orch.wait_until_idle().await;

    assert_eq!(orch.get_task(first.id).unwrap(), archived);
    assert_eq!(orch.status().completed, 4);
    assert_eq!(orch.status().failed, 1);
}

#[tokio::test]
async fn emits_lifecycle_events_in_order() {
    let orch = orchestrator(OrchestratorConfig::default());
    orch.register_agent(NamedAgent::new(TaskKind::Security, "scanner"));
    let events = record(&orch);

    let mut metadata = Payload::new();
    metadata.insert("requested_by".to_string(), "ci".into());
    let task = orch.create_task(
        TaskKind::Security,
        Payload::new(),
        TaskOptions::new().with_metadata(metadata.clone()),
    );
    orch.wait_until_idle().await;

    let kinds: Vec<EventKind> = events.lock().iter().map(OrchestratorEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::TaskCreated,
            EventKind::TaskStarted,
            EventKind::TaskCompleted,
            EventKind::QueueEmpty,
        ]
    );
    assert_eq!(orch.get_task(task.id).unwrap().metadata, Some(metadata));
}

#[tokio::test]
async fn listeners_may_submit_follow_up_tasks() {
    let orch = orchestrator(OrchestratorConfig::default());
    orch.register_agent(NamedAgent::new(TaskKind::Issue, "planner"));
    orch.register_agent(NamedAgent::new(TaskKind::Review, "reviewer"));

    let follow_up = orch.clone();
    orch.on(EventKind::TaskCompleted, move |event| {
        if let Some(task) = event.task() {
            if task.kind == TaskKind::Issue {
                follow_up.create_task(TaskKind::Review, Payload::new(), TaskOptions::new());
            }
        }
    });

    orch.create_task(TaskKind::Issue, Payload::new(), TaskOptions::new());
    orch.wait_until_idle().await;

    let completed = orch.get_tasks_by_status(TaskStatus::Completed);
    let kinds: Vec<TaskKind> = completed.iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TaskKind::Issue, TaskKind::Review]);
}

#[tokio::test]
async fn json_entry_point_rejects_bad_calls_and_accepts_good_ones() {
    let orch = orchestrator(OrchestratorConfig::default());
    orch.register_agent(NamedAgent::new(TaskKind::Issue, "planner"));

    assert!(matches!(
        orch.create_task_from_json("ship-it", serde_json::json!({}), TaskOptions::new()),
        Err(ShipError::Validation(_))
    ));
    assert!(matches!(
        orch.create_task_from_json("issue", serde_json::json!("text"), TaskOptions::new()),
        Err(ShipError::Validation(_))
    ));
    assert!(orch.is_idle());

    let task = orch
        .create_task_from_json(
            "issue",
            serde_json::json!({"issue_number": 12}),
            TaskOptions::new().with_priority(TaskPriority::Critical),
        )
        .unwrap();
    assert_eq!(task.kind, TaskKind::Issue);
    assert_eq!(task.priority, TaskPriority::Critical);
    assert_eq!(task.input["issue_number"], 12);

    orch.wait_until_idle().await;
    assert_eq!(
        orch.get_task(task.id).unwrap().status,
        TaskStatus::Completed
    );
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

fn kinds_for(events: &[OrchestratorEvent], id: uuid::Uuid) -> Vec<EventKind> {
    events
        .iter()
        .filter(|e| e.task().is_some_and(|t| t.id == id))
        .map(OrchestratorEvent::kind)
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn events_keep_lifecycle_order_across_threads() {
    let orch = orchestrator(OrchestratorConfig::default().with_max_concurrent_tasks(1));
    orch.register_agent(SleepyAgent::new(TaskKind::Issue, 20));
    orch.register_agent(NamedAgent::new(TaskKind::Review, "fast"));

    orch.on(EventKind::TaskCreated, |_| {
        std::thread::sleep(Duration::from_millis(100));
    });
    let heard = record(&orch);
    let mut rx = orch.subscribe();

    orch.create_task(TaskKind::Issue, labelled("a"), TaskOptions::new());
    let creator = orch.clone();
    let b = tokio::task::spawn_blocking(move || {
        creator.create_task(TaskKind::Review, labelled("b"), TaskOptions::new())
    })
    .await
    .unwrap();

    let mut broadcast = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.unwrap();
            let done = matches!(&event, OrchestratorEvent::TaskCompleted(t) if t.id == b.id);
            broadcast.push(event);
            if done {
                break;
            }
        }
    })
    .await
    .expect("task b never completed");

    let expected = vec![
        EventKind::TaskCreated,
        EventKind::TaskStarted,
        EventKind::TaskCompleted,
    ];
    assert_eq!(kinds_for(&broadcast, b.id), expected);
    assert_eq!(kinds_for(&heard.lock(), b.id), expected);
}
