use insightbot_core::config::RouterConfig;
use insightbot_core::{Error, Query, RoutingState};
use insightbot_providers::CompletionService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::capabilities::timed_completion;

pub const LLM_UNAVAILABLE: &str = "LLM not available.";
pub const EMPTY_COMPLETION: &str = "LLM error: Empty completion";

/// Writes the final answer for retrieval QA from the retrieved context.
pub struct AnswerSynthesizer {
    completion: Option<Arc<dyn CompletionService>>,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(completion: Option<Arc<dyn CompletionService>>, config: &RouterConfig) -> Self {
        Self {
            completion,
            max_tokens: config.synthesis_max_tokens,
            temperature: config.temperature,
            timeout: config.call_timeout(),
        }
    }

    pub fn prompt(query: &Query, context: &str) -> String {
        format!(
            "You are an AI assistant for system engineers.\n\
             Use the context below to answer accurately.\n\n\
             Context:\n{}\n\n\
             Question: {}\n\
             Answer:",
            context, query
        )
    }

    /// Pass-through unless the state needs synthesis. Always leaves a result.
    pub async fn synthesize(&self, mut state: RoutingState) -> RoutingState {
        if !state.needs_synthesis() {
            return state;
        }

        let Some(service) = &self.completion else {
            warn!("No completion service, cannot synthesize");
            state.result = Some(LLM_UNAVAILABLE.to_string());
            return state;
        };

        let context = state.context.as_deref().unwrap_or_default();
        let prompt = Self::prompt(&state.query, context);
        let answer = timed_completion(
            service.as_ref(),
            "synthesize",
            &prompt,
            self.max_tokens,
            self.temperature,
            self.timeout,
        )
        .await;

        state.result = Some(match answer {
            Ok(text) if text.trim().is_empty() => {
                warn!("Synthesis returned an empty completion");
                EMPTY_COMPLETION.to_string()
            }
            Ok(text) => {
                info!(chars = text.len(), "Answer synthesized");
                text.trim().to_string()
            }
            Err(Error::CompletionUnavailable) => LLM_UNAVAILABLE.to_string(),
            Err(e) => {
                error!(error = %e, "Synthesis failed");
                format!("LLM error: {}", e)
            }
        });
        state
    }
}
