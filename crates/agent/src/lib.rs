pub mod capabilities;
pub mod feedback;
pub mod intent;
pub mod router;
pub mod synthesizer;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use capabilities::Capabilities;
pub use feedback::{Feedback, FeedbackCollector, FeedbackSource, FixedFeedback, NoFeedback};
pub use intent::IntentClassifier;
pub use router::Router;
pub use synthesizer::AnswerSynthesizer;
pub use workflow::{Stage, WorkflowEngine};
