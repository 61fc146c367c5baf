pub mod feedback;
pub mod passages;

pub use feedback::{CsvFeedbackStore, FeedbackStore};
pub use passages::{PassageIndex, Retriever};
