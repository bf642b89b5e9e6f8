//! Priority-ordered queue of tasks waiting for dispatch.

use crate::types::{Task, TaskStatus};
use std::cmp::Ordering;
use uuid::Uuid;

/// Tasks waiting for dispatch, kept sorted by priority then arrival.
///
/// The whole queue is re-sorted on every insertion, retries included.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Vec<Task>,
}

/// Dispatch order: priority rank, then creation time, then submission order.
fn dispatch_order(a: &Task, b: &Task) -> Ordering {
    a.priority
        .rank()
        .cmp(&b.priority.rank())
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.sequence.cmp(&b.sequence))
}

impl TaskQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Insert a task and restore dispatch order.
    pub fn push(&mut self, task: Task) {
        self.tasks.push(task);
        self.tasks.sort_by(dispatch_order);
    }

    /// Remove and return the next task to dispatch.
    pub fn pop_front(&mut self) -> Option<Task> {
        if self.tasks.is_empty() {
            None
        } else {
            Some(self.tasks.remove(0))
        }
    }

    /// The next task to dispatch, without removing it.
    pub fn peek(&self) -> Option<&Task> {
        self.tasks.first()
    }

    /// Remove a task by ID, wherever it sits in the queue.
    pub fn remove(&mut self, id: Uuid) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(index))
    }

    /// Find a queued task by ID.
    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Whether a task with this ID is queued.
    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    /// Queued tasks in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Queued tasks with the given status, in dispatch order.
    pub fn with_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
