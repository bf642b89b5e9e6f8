//! Known models per provider and which providers this machine can reach.

use crate::config::{GatewayConfig, ModelProvider};
use serde::Serialize;

/// Static facts about one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// Provider-side model identifier.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Provider serving the model.
    pub provider: ModelProvider,
    /// Prompt plus completion, in tokens.
    pub context_window: u32,
    /// Completion limit, in tokens.
    pub max_output: u32,
    /// Function calling support.
    pub supports_tools: bool,
    /// Image input support.
    pub supports_vision: bool,
}

const fn model(
    id: &'static str,
    name: &'static str,
    provider: ModelProvider,
    context_window: u32,
    max_output: u32,
    supports_tools: bool,
    supports_vision: bool,
) -> ModelInfo {
    ModelInfo {
        id,
        name,
        provider,
        context_window,
        max_output,
        supports_tools,
        supports_vision,
    }
}

/// Every model the gateways are known to serve, grouped by provider.
pub const MODELS: &[ModelInfo] = &[
    model("llama-3.3-70b-versatile", "Llama 3.3 70B", ModelProvider::Groq, 128_000, 32_768, true, false),
    model("llama-3.1-8b-instant", "Llama 3.1 8B Instant", ModelProvider::Groq, 128_000, 8_192, true, false),
    model("mixtral-8x7b-32768", "Mixtral 8x7B", ModelProvider::Groq, 32_768, 32_768, true, false),
    model("gemma2-9b-it", "Gemma 2 9B", ModelProvider::Groq, 8_192, 8_192, true, false),
    model("gpt-4o", "GPT-4o", ModelProvider::OpenAi, 128_000, 16_384, true, true),
    model("gpt-4o-mini", "GPT-4o Mini", ModelProvider::OpenAi, 128_000, 16_384, true, true),
    model("gpt-4-turbo", "GPT-4 Turbo", ModelProvider::OpenAi, 128_000, 4_096, true, true),
    model("o1-preview", "O1 Preview", ModelProvider::OpenAi, 128_000, 32_768, false, false),
    model("meta-llama/llama-3.1-8b-instruct", "Llama 3.1 8B (OpenRouter)", ModelProvider::OpenRouter, 131_072, 8_192, true, false),
    model("llama3.2", "Llama 3.2 (Local)", ModelProvider::Ollama, 128_000, 4_096, true, false),
    model("codellama", "Code Llama (Local)", ModelProvider::Ollama, 16_384, 4_096, false, false),
    model("deepseek-coder-v2", "DeepSeek Coder V2 (Local)", ModelProvider::Ollama, 128_000, 4_096, true, false),
];

/// Look a model up by id.
pub fn model_info(id: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.id == id)
}

/// Models served by `provider`, in catalog order.
pub fn models_by_provider(provider: ModelProvider) -> Vec<&'static ModelInfo> {
    MODELS.iter().filter(|m| m.provider == provider).collect()
}

/// Providers usable right now, judged from `config` and the process environment.
pub fn available_providers(config: &GatewayConfig) -> Vec<ModelProvider> {
    available_providers_with(config, |name| std::env::var(name).ok())
}

/// Like [`available_providers`] with an injectable environment reader.
///
/// A keyed provider counts when its key variable is set, or when it is the
/// configured provider and `api_key` is filled in. Ollama counts when
/// `OLLAMA_BASE_URL` is set, `ENABLE_OLLAMA=true`, or it is the configured
/// provider.
pub fn available_providers_with<F>(config: &GatewayConfig, lookup: F) -> Vec<ModelProvider>
where
    F: Fn(&str) -> Option<String>,
{
    let set = |name: &str| lookup(name).is_some_and(|v| !v.is_empty());
    ModelProvider::ALL
        .into_iter()
        .filter(|provider| {
            let configured = config.provider == *provider;
            match provider.api_key_env() {
                Some(var) => set(var) || (configured && !config.api_key.is_empty()),
                None => {
                    configured
                        || set("OLLAMA_BASE_URL")
                        || lookup("ENABLE_OLLAMA").as_deref() == Some("true")
                }
            }
        })
        .collect()
}
