//! Model gateways and the built-in agents that use them.

pub mod agents;
pub mod backends;
pub mod catalog;
pub mod config;
pub mod failover;
pub mod llm;
pub mod prompts;

pub use agents::{
    builtin_agents, builtin_descriptors, CodeReviewAgent, FeedbackHandlerAgent,
    IssueProcessorAgent, ReviewVerdict, SecurityScannerAgent,
};
pub use backends::openai::OpenAiGateway;
pub use backends::ModelGateway;
pub use catalog::{available_providers, model_info, models_by_provider, ModelInfo, MODELS};
pub use config::{GatewayConfig, ModelProvider};
pub use failover::FallbackGateway;
pub use llm::{build_gateway, build_gateway_with_key};

use ship_core::ShipResult;
use ship_orchestrator::{Orchestrator, OrchestratorConfig};
use std::sync::Arc;

/// A fresh orchestrator with every built-in agent registered.
///
/// Must be called inside a Tokio runtime.
pub fn create_orchestrator(
    config: OrchestratorConfig,
    gateway: Arc<dyn ModelGateway>,
) -> ShipResult<Orchestrator> {
    let orchestrator = Orchestrator::new(config)?;
    for agent in builtin_agents(gateway) {
        orchestrator.register_agent(agent);
    }
    Ok(orchestrator)
}
