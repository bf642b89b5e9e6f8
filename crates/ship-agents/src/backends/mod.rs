//! Model gateway trait and its implementations.

pub mod openai;

use async_trait::async_trait;
use ship_core::ShipResult;

/// A text-generation model the built-in agents can call.
///
/// Implementations wrap one provider API. To add one, implement this trait and
/// wire it into [`build_gateway`](crate::build_gateway).
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Model identifier, used in logs.
    fn name(&self) -> &str;

    /// Single-turn completion: optional system prompt plus one user prompt.
    async fn generate(&self, system: Option<&str>, prompt: &str) -> ShipResult<String>;
}
