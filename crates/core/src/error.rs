use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    /// No completion service was configured for classification.
    #[error("Classification unavailable")]
    ClassificationUnavailable,

    /// The classifier answered with text outside the category set.
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Completion service unavailable")]
    CompletionUnavailable,

    #[error("Completion call failed: {0}")]
    CompletionCallFailed(String),

    #[error("Retriever unavailable")]
    RetrieverUnavailable,

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl Error {
    /// True for the errors that mean "the capability is not there at all",
    /// as opposed to "it was there and the call went wrong".
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Error::ClassificationUnavailable | Error::CompletionUnavailable | Error::RetrieverUnavailable
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
