//! Gateway that falls back across models.

use crate::backends::ModelGateway;
use async_trait::async_trait;
use ship_core::{ShipError, ShipResult};
use tracing::{info, warn};

/// A `ModelGateway` that wraps several gateways and tries them in order.
///
/// The first successful completion wins. Every failure is logged and the next
/// gateway is tried; if all fail, the last error is returned.
pub struct FallbackGateway {
    gateways: Vec<Box<dyn ModelGateway>>,
}

impl FallbackGateway {
    /// Gateways are tried in the given order.
    pub fn new(gateways: Vec<Box<dyn ModelGateway>>) -> Self {
        Self { gateways }
    }

    /// Number of gateways in the chain.
    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    /// True when there is nothing to try.
    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}

#[async_trait]
impl ModelGateway for FallbackGateway {
    fn name(&self) -> &str {
        self.gateways.first().map_or("fallback", |g| g.name())
    }

    async fn generate(&self, system: Option<&str>, prompt: &str) -> ShipResult<String> {
        let mut last_err: Option<ShipError> = None;

        for (idx, gateway) in self.gateways.iter().enumerate() {
            match gateway.generate(system, prompt).await {
                Ok(text) => {
                    if idx > 0 {
                        info!(model = gateway.name(), position = idx, "Fallback model succeeded");
                    }
                    return Ok(text);
                }
                Err(e) => {
                    warn!(
                        model = gateway.name(),
                        position = idx,
                        error = %e,
                        "Model failed, trying next"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ShipError::execution("All models failed")))
    }
}
