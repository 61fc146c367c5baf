use insightbot_core::{Error, Result};
use insightbot_providers::CompletionService;
use insightbot_storage::Retriever;
use insightbot_tools::{Geocoder, ToolAdapter};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// External services available to a workflow. Any of them may be absent;
/// each stage degrades on its own when the one it needs is missing.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub completion: Option<Arc<dyn CompletionService>>,
    pub web_search: Option<Arc<dyn ToolAdapter>>,
    pub code_search: Option<Arc<dyn ToolAdapter>>,
    pub weather: Option<Arc<dyn ToolAdapter>>,
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub retriever: Option<Arc<dyn Retriever>>,
}

impl Capabilities {
    /// Names of the configured capabilities, for startup logging.
    pub fn available(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.completion.is_some() {
            names.push("completion");
        }
        if self.web_search.is_some() {
            names.push("web_search");
        }
        if self.code_search.is_some() {
            names.push("code_search");
        }
        if self.weather.is_some() {
            names.push("weather");
        }
        if self.geocoder.is_some() {
            names.push("geocoder");
        }
        if self.retriever.is_some() {
            names.push("retriever");
        }
        names
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("available", &self.available())
            .finish()
    }
}

/// Run an external call under the per-call deadline.
pub(crate) async fn bounded<T, F>(what: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!("{} timed out after {}s", what, limit.as_secs()))),
    }
}

/// One bounded completion call with its latency logged.
pub(crate) async fn timed_completion(
    service: &dyn CompletionService,
    label: &str,
    prompt: &str,
    max_tokens: u32,
    temperature: f32,
    limit: Duration,
) -> Result<String> {
    let start = Instant::now();
    let result = bounded(label, limit, service.complete(prompt, max_tokens, temperature)).await;
    info!(
        call = label,
        duration_ms = start.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "Completion call finished"
    );
    result
}
