use insightbot_core::config::RouterConfig;
use insightbot_core::{Category, Error, Query, Result};
use insightbot_providers::CompletionService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::capabilities::timed_completion;

/// Asks the completion service which handler a query belongs to.
///
/// Classification never fails from the caller's point of view: anything
/// other than a clean, in-set answer routes to retrieval QA.
pub struct IntentClassifier {
    completion: Option<Arc<dyn CompletionService>>,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl IntentClassifier {
    pub const DEFAULT: Category = Category::RetrievalQa;

    pub fn new(completion: Option<Arc<dyn CompletionService>>, config: &RouterConfig) -> Self {
        Self {
            completion,
            max_tokens: config.classify_max_tokens,
            temperature: config.temperature,
            timeout: config.call_timeout(),
        }
    }

    pub fn prompt(query: &Query) -> String {
        let labels = Category::ALL.map(|c| c.label()).join(", ");
        format!(
            "You are an intelligent routing assistant.\n\
             Classify the user's query into exactly ONE category from this list:\n\
             [{labels}].\n\n\
             Rules:\n\
             - Use '{weather}' for temperature, rain, or city climate queries.\n\
             - Use '{web}' for general knowledge or web information.\n\
             - Use '{code}' for coding, repositories, or script examples.\n\
             - Use '{rag}' for internal policy, logs, or documentation queries.\n\n\
             User Query: {query}\n\n\
             Return only the category name (no explanation).",
            labels = labels,
            weather = Category::Weather.label(),
            web = Category::WebSearch.label(),
            code = Category::CodeSearch.label(),
            rag = Category::RetrievalQa.label(),
            query = query,
        )
    }

    pub async fn try_classify(&self, query: &Query) -> Result<Category> {
        let service = self.completion.as_ref().ok_or(Error::ClassificationUnavailable)?;
        let answer = timed_completion(
            service.as_ref(),
            "classify",
            &Self::prompt(query),
            self.max_tokens,
            self.temperature,
            self.timeout,
        )
        .await?;

        Category::from_label(&answer).ok_or(Error::UnknownCategory(answer))
    }

    pub async fn classify(&self, query: &Query) -> Category {
        match self.try_classify(query).await {
            Ok(category) => {
                info!(category = %category, "Query classified");
                category
            }
            Err(e) => {
                warn!(error = %e, fallback = %Self::DEFAULT, "Classification failed, using default route");
                Self::DEFAULT
            }
        }
    }
}
