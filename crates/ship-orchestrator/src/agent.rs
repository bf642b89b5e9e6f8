//! The handler trait for one task kind.

use crate::types::TaskKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ship_core::{Payload, ShipResult};

/// Metadata describing an agent and the task kind it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Human-readable agent name.
    pub name: String,
    /// Task kind this agent handles.
    pub kind: TaskKind,
    /// One-line summary of what the agent does.
    pub description: String,
}

impl AgentDescriptor {
    /// Build a descriptor.
    pub fn new(name: impl Into<String>, kind: TaskKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
        }
    }
}

/// Trait that all task handlers implement.
///
/// The orchestrator calls [`Agent::execute`] with the task's input, verbatim,
/// once per attempt. An `Err` counts as a failed attempt and may be retried.
#[async_trait]
pub trait Agent: Send + Sync {
    fn descriptor(&self) -> &AgentDescriptor;

    async fn execute(&self, input: Payload) -> ShipResult<Payload>;
}
