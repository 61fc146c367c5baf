pub mod client;
pub mod factory;
pub mod openai;

use async_trait::async_trait;
use insightbot_core::Result;

/// A text-in, text-out language model endpoint.
///
/// Implementations report `Error::CompletionUnavailable` when they cannot be
/// used at all and `Error::CompletionCallFailed` for transport, status or
/// parsing problems (including an empty answer).
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;
}

pub use factory::create_completion_service;
pub use openai::OpenAICompatProvider;
