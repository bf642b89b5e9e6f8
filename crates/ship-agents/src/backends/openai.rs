//! OpenAI-compatible chat completions gateway.

use super::ModelGateway;
use crate::config::{GatewayConfig, ModelProvider};
use async_trait::async_trait;
use ship_core::{ShipError, ShipResult};
use tracing::debug;

/// OpenAI-compatible chat completions gateway.
///
/// Works with Groq, OpenAI, OpenRouter, Ollama, and any other provider
/// that implements the OpenAI chat completions API.
pub struct OpenAiGateway {
    provider: ModelProvider,
    model_id: String,
    api_key: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    http: reqwest::Client,
}

impl OpenAiGateway {
    /// Gateway for `model_id` using the provider settings in `config`.
    pub fn new(config: &GatewayConfig, model_id: impl Into<String>, api_key: String) -> Self {
        Self {
            provider: config.provider,
            model_id: model_id.into(),
            api_key,
            base_url: config.base_url().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            http: reqwest::Client::new(),
        }
    }

    fn build_messages(system: Option<&str>, prompt: &str) -> Vec<serde_json::Value> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }
        messages.push(serde_json::json!({
            "role": "user",
            "content": prompt
        }));
        messages
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Content-Type", "application/json");
        let request = if self.api_key.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        };

        // OpenRouter attributes traffic through these
        if self.provider == ModelProvider::OpenRouter {
            request.header("X-Title", "Ship")
        } else {
            request
        }
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    fn name(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, system: Option<&str>, prompt: &str) -> ShipResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model_id,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": Self::build_messages(system, prompt),
        });

        debug!(model = %self.model_id, provider = %self.provider, "Sending completion request");
        let resp = self
            .add_provider_headers(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ShipError::Http(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ShipError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(ShipError::Http(format!(
                "{} API error {status}: {text}",
                self.provider
            )));
        }

        let resp_body: serde_json::Value = serde_json::from_str(&text)?;
        parse_chat_response(&resp_body)
    }
}

/// Text of the first choice in a chat completions response.
pub fn parse_chat_response(body: &serde_json::Value) -> ShipResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            ShipError::Http(format!(
                "Malformed completion response, no choices[0].message.content: {body}"
            ))
        })
}
