use insightbot_core::{Config, Query, RoutingState};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::capabilities::Capabilities;
use crate::feedback::{FeedbackCollector, FeedbackSource, NoFeedback};
use crate::router::Router;
use crate::synthesizer::AnswerSynthesizer;

pub const EMPTY_QUERY: &str = "Error: query must not be empty.";
pub const NO_RESPONSE: &str = "No response generated.";

/// Position of one cycle in the workflow. Each stage names the work that
/// has just been done on entering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Routed,
    Synthesizing,
    FeedbackCollected,
    Done,
}

impl Stage {
    /// Transition function. `Done` is absorbing.
    pub fn next(self, state: &RoutingState) -> Stage {
        match self {
            Stage::Start => Stage::Routed,
            Stage::Routed if state.needs_synthesis() => Stage::Synthesizing,
            Stage::Routed => Stage::FeedbackCollected,
            Stage::Synthesizing => Stage::FeedbackCollected,
            Stage::FeedbackCollected => Stage::Done,
            Stage::Done => Stage::Done,
        }
    }

    /// Label used in latency logs.
    pub fn worker(&self) -> &'static str {
        match self {
            Stage::Start | Stage::Done => "-",
            Stage::Routed => "Router",
            Stage::Synthesizing => "Synthesizer",
            Stage::FeedbackCollected => "Feedback",
        }
    }
}

/// Drives one query through routing, optional synthesis and feedback.
pub struct WorkflowEngine {
    router: Router,
    synthesizer: AnswerSynthesizer,
    collector: FeedbackCollector,
    feedback: Arc<dyn FeedbackSource>,
}

impl WorkflowEngine {
    pub fn new(capabilities: Capabilities, config: &Config, collector: FeedbackCollector) -> Self {
        info!(capabilities = ?capabilities.available(), "Workflow engine ready");
        let synthesizer = AnswerSynthesizer::new(capabilities.completion.clone(), &config.router);
        Self {
            router: Router::new(capabilities, config.router.clone(), config.tools.weather.clone()),
            synthesizer,
            collector,
            feedback: Arc::new(NoFeedback),
        }
    }

    pub fn with_feedback_source(mut self, source: Arc<dyn FeedbackSource>) -> Self {
        self.feedback = source;
        self
    }

    /// Single-call boundary: never fails, always returns printable text.
    pub async fn run_cycle(&self, raw: &str) -> String {
        let Ok(query) = Query::parse(raw) else {
            warn!("Rejected empty query");
            return EMPTY_QUERY.to_string();
        };
        self.run(query)
            .await
            .result
            .unwrap_or_else(|| NO_RESPONSE.to_string())
    }

    pub async fn run(&self, query: Query) -> RoutingState {
        self.drive(query).await.0
    }

    async fn drive(&self, query: Query) -> (RoutingState, Vec<Stage>) {
        let started = Instant::now();
        let mut state = RoutingState::new(query);
        let mut stage = Stage::Start;
        let mut path = vec![stage];

        while stage != Stage::Done {
            let next = stage.next(&state);
            state = self.enter(next, state).await;
            path.push(next);
            stage = next;
        }

        info!(
            source = state.source(),
            total_ms = started.elapsed().as_millis() as u64,
            "Cycle complete"
        );
        (state, path)
    }

    async fn enter(&self, stage: Stage, state: RoutingState) -> RoutingState {
        let start = Instant::now();
        let state = match stage {
            Stage::Start | Stage::Done => return state,
            Stage::Routed => self.router.route(state).await,
            Stage::Synthesizing => self.synthesizer.synthesize(state).await,
            Stage::FeedbackCollected => {
                let feedback = self.feedback.gather(&state).await;
                self.collector.record(&state, feedback.rating, &feedback.comment).await;
                state
            }
        };
        info!(
            stage = stage.worker(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Stage finished"
        );
        state
    }
}
