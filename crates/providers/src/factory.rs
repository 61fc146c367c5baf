use insightbot_core::config::ProviderConfig;
use insightbot_core::{Config, Error, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{CompletionService, OpenAICompatProvider};

/// Default chat-completions base for the OpenAI-compatible providers we know.
fn default_api_base(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "groq" => Some("https://api.groq.com/openai/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

/// Providers that run locally and accept requests without a key.
fn key_optional(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm")
}

/// Build the completion service named by `llm.provider`.
///
/// Returns `Ok(None)` when the provider is known but has no credentials; the
/// workflow then runs in its degraded mode (RAG default route, raw tool
/// output, "LLM not available."). Unknown providers without an `apiBase`
/// are a configuration error.
pub fn create_completion_service(config: &Config) -> Result<Option<Arc<dyn CompletionService>>> {
    let name = config.llm.provider.trim();
    let empty = ProviderConfig::default();
    let provider_cfg = config.get_provider(name).unwrap_or(&empty);

    let api_base = match provider_cfg.api_base.as_deref().filter(|b| !b.trim().is_empty()) {
        Some(base) => base,
        None => default_api_base(name).ok_or_else(|| {
            Error::Config(format!(
                "Provider '{}' is not a known OpenAI-compatible provider; set providers.{}.apiBase",
                name, name
            ))
        })?,
    };

    if provider_cfg.api_key.is_empty() && !key_optional(name) {
        warn!(provider = %name, "No API key configured; completion service disabled");
        return Ok(None);
    }

    info!(provider = %name, model = %config.llm.model, api_base = %api_base, "Completion service initialized");
    let provider = OpenAICompatProvider::new_with_proxy(
        &provider_cfg.api_key,
        Some(api_base),
        &config.llm.model,
        provider_cfg.proxy.as_deref(),
        config.network.proxy.as_deref(),
        &config.network.no_proxy,
    );
    Ok(Some(Arc::new(provider)))
}
