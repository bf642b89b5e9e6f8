//! Gateway construction from config.

use crate::backends::openai::OpenAiGateway;
use crate::backends::ModelGateway;
use crate::config::GatewayConfig;
use crate::failover::FallbackGateway;
use ship_core::ShipResult;
use std::sync::Arc;
use tracing::info;

/// Build the gateway described by `config`.
///
/// Every provider speaks the OpenAI-compatible API. With fallback models the
/// result is a [`FallbackGateway`] over the whole model chain.
pub fn build_gateway(config: &GatewayConfig) -> ShipResult<Arc<dyn ModelGateway>> {
    let api_key = config.resolve_api_key()?;
    Ok(build_gateway_with_key(config, api_key))
}

/// Like [`build_gateway`] with an already resolved API key.
pub fn build_gateway_with_key(config: &GatewayConfig, api_key: String) -> Arc<dyn ModelGateway> {
    let chain = config.model_chain();
    info!(
        provider = %config.provider,
        model = %config.model_id,
        fallbacks = chain.len() - 1,
        "Model gateway configured"
    );

    if chain.len() == 1 {
        return Arc::new(OpenAiGateway::new(config, config.model_id.clone(), api_key));
    }

    let gateways: Vec<Box<dyn ModelGateway>> = chain
        .into_iter()
        .map(|model| {
            Box::new(OpenAiGateway::new(config, model, api_key.clone())) as Box<dyn ModelGateway>
        })
        .collect();
    Arc::new(FallbackGateway::new(gateways))
}
