//! Provider and model settings.

use serde::{Deserialize, Serialize};
use ship_core::{ShipError, ShipResult};

/// Hosted or local inference service speaking the OpenAI chat completions API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Groq cloud inference. Fast, free tier with rate limits.
    #[default]
    Groq,
    /// OpenAI platform.
    OpenAi,
    /// OpenRouter model router.
    OpenRouter,
    /// Local Ollama server. No API key needed.
    Ollama,
}

impl ModelProvider {
    /// Every supported provider, in display order.
    pub const ALL: [ModelProvider; 4] = [
        ModelProvider::Groq,
        ModelProvider::OpenAi,
        ModelProvider::OpenRouter,
        ModelProvider::Ollama,
    ];

    /// Environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ModelProvider::Groq => Some("GROQ_API_KEY"),
            ModelProvider::OpenAi => Some("OPENAI_API_KEY"),
            ModelProvider::OpenRouter => Some("OPENROUTER_API_KEY"),
            ModelProvider::Ollama => None,
        }
    }

    /// API root used when `api_base_url` is not set.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ModelProvider::Groq => "https://api.groq.com/openai",
            ModelProvider::OpenAi => "https://api.openai.com",
            ModelProvider::OpenRouter => "https://openrouter.ai/api",
            ModelProvider::Ollama => "http://localhost:11434",
        }
    }
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelProvider::Groq => "groq",
            ModelProvider::OpenAi => "openai",
            ModelProvider::OpenRouter => "openrouter",
            ModelProvider::Ollama => "ollama",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = ShipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| ShipError::Validation(format!("Unknown provider: {s}")))
    }
}

/// Which model the built-in agents talk to, and what to try when it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Which service to call.
    #[serde(default)]
    pub provider: ModelProvider,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Empty means "read the provider's environment variable".
    #[serde(default)]
    pub api_key: String,
    /// Overrides the provider default, e.g. for a proxy or a test server.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion limit per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Models tried in order, on the same provider, after `model_id` fails.
    #[serde(default)]
    pub fallback_models: Vec<String>,
}

fn default_model_id() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            model_id: default_model_id(),
            api_key: String::new(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            fallback_models: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Effective API root, without a trailing slash.
    pub fn base_url(&self) -> &str {
        match &self.api_base_url {
            Some(url) => url.trim_end_matches('/'),
            None => self.provider.default_base_url(),
        }
    }

    /// `model_id` followed by the fallbacks, duplicates removed.
    pub fn model_chain(&self) -> Vec<String> {
        let mut chain = vec![self.model_id.clone()];
        for model in &self.fallback_models {
            if !chain.contains(model) {
                chain.push(model.clone());
            }
        }
        chain
    }

    /// API key from the config, else from the process environment.
    pub fn resolve_api_key(&self) -> ShipResult<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// API key from the config, else from `lookup` (an environment reader).
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> ShipResult<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !self.api_key.is_empty() {
            return Ok(self.api_key.clone());
        }
        match self.provider.api_key_env() {
            None => Ok(String::new()),
            Some(var) => lookup(var).filter(|key| !key.is_empty()).ok_or_else(|| {
                ShipError::Config(format!(
                    "No API key for provider '{}': set model.api_key or {var}",
                    self.provider
                ))
            }),
        }
    }

    /// Copy safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.api_key.is_empty() {
            copy.api_key = "***".to_string();
        }
        copy
    }
}
