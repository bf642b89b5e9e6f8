//! Task model: kinds, statuses, priorities, and the task record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ship_core::{Payload, ShipError};
use std::str::FromStr;
use uuid::Uuid;

/// Kind of work a task represents. Each kind is served by at most one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Analyze an issue and draft an implementation plan.
    Issue,
    /// Review a pull request diff.
    Review,
    /// Scan code for vulnerabilities.
    Security,
    /// Ship a build somewhere.
    Deploy,
    /// Answer review comments.
    Feedback,
}

impl TaskKind {
    /// Every kind, in declaration order.
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Issue,
        TaskKind::Review,
        TaskKind::Security,
        TaskKind::Deploy,
        TaskKind::Feedback,
    ];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Issue => "issue",
            TaskKind::Review => "review",
            TaskKind::Security => "security",
            TaskKind::Deploy => "deploy",
            TaskKind::Feedback => "feedback",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = ShipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ShipError::Validation(format!("Unknown task type: '{s}'")))
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Submitted, waiting for its first dispatch.
    Pending,
    /// Waiting to run again after a failed attempt.
    Queued,
    /// An agent is working on it.
    Running,
    /// Finished with output.
    Completed,
    /// Gave up after the last allowed attempt.
    Failed,
    /// Withdrawn before it ran.
    Cancelled,
}

impl TaskStatus {
    /// Whether the task has reached a final state and lives in the archive.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ShipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "queued" => Ok(TaskStatus::Queued),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(ShipError::Validation(format!(
                "Unknown task status: '{other}'"
            ))),
        }
    }
}

/// Dispatch priority. Higher priorities leave the queue first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Default for most tasks.
    #[default]
    Medium,
    /// Ahead of routine work.
    High,
    /// Dispatched before everything else.
    Critical,
}

impl TaskPriority {
    /// Queue rank; lower ranks are dispatched first.
    pub fn rank(&self) -> u8 {
        match self {
            TaskPriority::Critical => 0,
            TaskPriority::High => 1,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 3,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for TaskPriority {
    type Err = ShipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            other => Err(ShipError::Validation(format!(
                "Unknown task priority: '{other}'"
            ))),
        }
    }
}

/// Default retry ceiling for new tasks.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Per-task overrides accepted by `Orchestrator::create_task`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Falls back to the orchestrator's `default_priority`.
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    /// Falls back to [`DEFAULT_MAX_RETRIES`].
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Caller data carried on the task, untouched by the orchestrator.
    #[serde(default)]
    pub metadata: Option<Payload>,
}

impl TaskOptions {
    /// Options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the retry ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Attach caller metadata.
    pub fn with_metadata(mut self, metadata: Payload) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A unit of work tracked from submission to a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID.
    pub id: Uuid,
    /// Selects the agent.
    #[serde(rename = "type")]
    pub kind: TaskKind,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Dispatch priority.
    pub priority: TaskPriority,
    /// Agent input.
    pub input: Payload,
    /// Agent output, set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Payload>,
    /// Last error, set on terminal failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Submission time; retries keep it.
    pub created_at: DateTime<Utc>,
    /// Start of the latest attempt.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Time the task reached a terminal state.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failed attempts so far.
    pub retries: u32,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Caller metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Payload>,
    /// Submission order; breaks ties between tasks created in the same instant.
    #[serde(default)]
    pub sequence: u64,
}

impl Task {
    /// Create a pending task with default priority and retry ceiling.
    pub fn new(kind: TaskKind, input: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status: TaskStatus::Pending,
            priority: TaskPriority::default(),
            input,
            output: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            retries: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            metadata: None,
            sequence: 0,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the retry ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Attach caller metadata.
    pub fn with_metadata(mut self, metadata: Option<Payload>) -> Self {
        self.metadata = metadata;
        self
    }

    pub(crate) fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Whether another attempt is allowed after a failure.
    pub fn can_retry(&self) -> bool {
        self.retries < self.max_retries
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_completed(&mut self, output: Payload) {
        self.status = TaskStatus::Completed;
        self.output = Some(output);
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    pub(crate) fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.output = None;
        self.completed_at = Some(Utc::now());
    }

    /// Bump the retry counter and return the new attempt number.
    pub(crate) fn mark_retrying(&mut self) -> u32 {
        self.retries += 1;
        self.status = TaskStatus::Queued;
        self.retries
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}
