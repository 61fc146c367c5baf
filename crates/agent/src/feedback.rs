use async_trait::async_trait;
use insightbot_core::{FeedbackRecord, RoutingState};
use insightbot_storage::FeedbackStore;
use std::sync::Arc;
use tracing::{error, info};

/// A rating and comment for one answer. Both may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feedback {
    pub rating: Option<u8>,
    pub comment: String,
}

impl Feedback {
    /// Parse free-text rating input; anything outside 1..=5 counts as no rating.
    pub fn from_input(rating: &str, comment: &str) -> Self {
        Self {
            rating: rating.trim().parse::<u8>().ok().filter(|r| (1..=5).contains(r)),
            comment: comment.trim().to_string(),
        }
    }
}

/// Where ratings come from once an answer has been produced.
#[async_trait]
pub trait FeedbackSource: Send + Sync {
    async fn gather(&self, state: &RoutingState) -> Feedback;
}

/// Records every cycle with an empty rating.
pub struct NoFeedback;

#[async_trait]
impl FeedbackSource for NoFeedback {
    async fn gather(&self, _state: &RoutingState) -> Feedback {
        Feedback::default()
    }
}

/// Always answers with the same rating and comment.
pub struct FixedFeedback(pub Feedback);

#[async_trait]
impl FeedbackSource for FixedFeedback {
    async fn gather(&self, _state: &RoutingState) -> Feedback {
        self.0.clone()
    }
}

/// Appends one feedback row per completed cycle.
pub struct FeedbackCollector {
    store: Arc<dyn FeedbackStore>,
}

impl FeedbackCollector {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self { store }
    }

    /// Storage failures are logged and swallowed.
    pub async fn record(&self, state: &RoutingState, rating: Option<u8>, comment: &str) {
        let record = FeedbackRecord::from_state(state, rating, comment);
        match self.store.append(&record).await {
            Ok(()) => info!(source = %record.source, rating = ?record.rating, "Feedback saved"),
            Err(e) => error!(error = %e, source = %record.source, "Failed to save feedback"),
        }
    }
}
