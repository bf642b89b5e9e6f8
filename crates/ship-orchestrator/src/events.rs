//! Lifecycle events and their delivery.

use crate::agent::AgentDescriptor;
use crate::types::Task;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Lifecycle notifications published by the orchestrator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// New task accepted.
    TaskCreated(Task),
    /// Attempt handed to an agent.
    TaskStarted(Task),
    /// Task finished with output.
    TaskCompleted(Task),
    /// Task failed for good.
    TaskFailed {
        /// The archived task.
        task: Task,
        /// Final error message.
        error: String,
    },
    /// Attempt failed and a retry is scheduled.
    TaskRetrying {
        /// The task, now waiting out its retry delay.
        task: Task,
        /// Retry number, starting at 1.
        attempt: u32,
    },
    /// Agent registered or replaced.
    AgentRegistered(AgentDescriptor),
    /// Nothing queued, running, or waiting out a retry delay.
    QueueEmpty,
}

impl OrchestratorEvent {
    /// Name used for listener filtering.
    pub fn kind(&self) -> EventKind {
        match self {
            OrchestratorEvent::TaskCreated(_) => EventKind::TaskCreated,
            OrchestratorEvent::TaskStarted(_) => EventKind::TaskStarted,
            OrchestratorEvent::TaskCompleted(_) => EventKind::TaskCompleted,
            OrchestratorEvent::TaskFailed { .. } => EventKind::TaskFailed,
            OrchestratorEvent::TaskRetrying { .. } => EventKind::TaskRetrying,
            OrchestratorEvent::AgentRegistered(_) => EventKind::AgentRegistered,
            OrchestratorEvent::QueueEmpty => EventKind::QueueEmpty,
        }
    }

    /// The task this event is about, if any.
    pub fn task(&self) -> Option<&Task> {
        match self {
            OrchestratorEvent::TaskCreated(task)
            | OrchestratorEvent::TaskStarted(task)
            | OrchestratorEvent::TaskCompleted(task)
            | OrchestratorEvent::TaskFailed { task, .. }
            | OrchestratorEvent::TaskRetrying { task, .. } => Some(task),
            OrchestratorEvent::AgentRegistered(_) | OrchestratorEvent::QueueEmpty => None,
        }
    }
}

/// Event names used for listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `task:created`
    TaskCreated,
    /// `task:started`
    TaskStarted,
    /// `task:completed`
    TaskCompleted,
    /// `task:failed`
    TaskFailed,
    /// `task:retrying`
    TaskRetrying,
    /// `agent:registered`
    AgentRegistered,
    /// `queue:empty`
    QueueEmpty,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::TaskCreated => "task:created",
            EventKind::TaskStarted => "task:started",
            EventKind::TaskCompleted => "task:completed",
            EventKind::TaskFailed => "task:failed",
            EventKind::TaskRetrying => "task:retrying",
            EventKind::AgentRegistered => "agent:registered",
            EventKind::QueueEmpty => "queue:empty",
        };
        f.write_str(name)
    }
}

/// Synchronous event callback.
pub type Listener = Arc<dyn Fn(&OrchestratorEvent) + Send + Sync>;

/// Fan-out of orchestrator events to synchronous listeners and async subscribers.
///
/// Listeners run on the emitting thread, in registration order. Callers must
/// not hold orchestrator state locks while emitting.
pub struct EventBus {
    listeners: RwLock<Vec<(Option<EventKind>, Listener)>>,
    tx: broadcast::Sender<OrchestratorEvent>,
}

impl EventBus {
    /// Bus whose broadcast channel buffers `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push((Some(kind), Arc::new(listener)));
    }

    /// Register a listener for every event.
    pub fn on_any<F>(&self, listener: F)
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push((None, Arc::new(listener)));
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.tx.subscribe()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver `event` to matching listeners, then to subscribers.
    pub fn emit(&self, event: OrchestratorEvent) {
        let kind = event.kind();
        // Snapshot so listeners may register further listeners.
        let matching: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .filter(|(filter, _)| filter.map_or(true, |k| k == kind))
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in matching {
            listener(&event);
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
