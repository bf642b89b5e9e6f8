//! `ship.toml` and task-file loading.

use serde::{Deserialize, Serialize};
use ship_agents::GatewayConfig;
use ship_core::{Payload, ShipError, ShipResult};
use ship_orchestrator::{OrchestratorConfig, TaskKind, TaskOptions, TaskPriority};
use std::path::Path;
use tracing::debug;

/// Everything `ship.toml` can configure. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub model: GatewayConfig,
}

impl ShipConfig {
    /// Load and validate `path`. A missing file means all defaults.
    pub fn load(path: &Path) -> ShipResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = parse_toml(path, "config")?;
        config.orchestrator.validate()?;
        Ok(config)
    }

    /// Copy safe to print.
    pub fn redacted(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            model: self.model.redacted(),
        }
    }
}

/// One `[[tasks]]` entry of a task file.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEntry {
    pub kind: String,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default = "empty_object")]
    pub input: serde_json::Value,
    #[serde(default)]
    pub metadata: Option<Payload>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Payload::new())
}

impl TaskEntry {
    pub fn options(&self) -> TaskOptions {
        TaskOptions {
            priority: self.priority,
            max_retries: self.max_retries,
            metadata: self.metadata.clone(),
        }
    }

    fn validate(&self, index: usize) -> ShipResult<()> {
        self.kind.parse::<TaskKind>().map_err(|e| {
            ShipError::Validation(format!("tasks[{index}]: {e}"))
        })?;
        if !self.input.is_object() {
            return Err(ShipError::Validation(format!(
                "tasks[{index}]: input must be a table"
            )));
        }
        Ok(())
    }
}

/// A batch of tasks to submit in order.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

impl TaskFile {
    /// Load `path` and check every entry before anything is submitted.
    pub fn load(path: &Path) -> ShipResult<Self> {
        let file: Self = parse_toml(path, "task file")?;
        for (index, entry) in file.tasks.iter().enumerate() {
            entry.validate(index)?;
        }
        Ok(file)
    }
}

fn parse_toml<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> ShipResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ShipError::Config(format!(
            "Failed to read {what} '{}': {e}",
            path.display()
        ))
    })?;
    toml::from_str(&content).map_err(|e| {
        ShipError::Config(format!(
            "Failed to parse {what} '{}': {e}",
            path.display()
        ))
    })
}
