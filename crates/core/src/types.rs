use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A caller's question. Always non-empty and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query(String);

impl Query {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("query must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Routing label assigned to every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Weather,
    WebSearch,
    CodeSearch,
    RetrievalQa,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Weather,
        Category::WebSearch,
        Category::CodeSearch,
        Category::RetrievalQa,
    ];

    /// Label used in the classifier prompt and in feedback records.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Weather => "Weather",
            Category::WebSearch => "Tavily",
            Category::CodeSearch => "GitHub",
            Category::RetrievalQa => "RAG",
        }
    }

    /// Parse a classifier answer. Accepts the prompt labels and the variant
    /// names, ignoring case and surrounding quotes or punctuation.
    pub fn from_label(raw: &str) -> Option<Self> {
        let cleaned = raw
            .trim()
            .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
            .to_ascii_lowercase();
        match cleaned.as_str() {
            "weather" => Some(Category::Weather),
            "tavily" | "websearch" | "web_search" => Some(Category::WebSearch),
            "github" | "codesearch" | "code_search" => Some(Category::CodeSearch),
            "rag" | "retrievalqa" | "retrieval_qa" => Some(Category::RetrievalQa),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a cycle ended without a normal answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteFailure {
    /// The category's handler (tool or retriever) is not wired in.
    HandlerUnavailable,
    /// The handler ran and failed, or routing hit an unexpected error.
    Internal,
}

/// Per-query record threaded through the workflow stages.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingState {
    pub query: Query,
    pub category: Option<Category>,
    pub raw_output: Option<String>,
    pub context: Option<String>,
    pub result: Option<String>,
    pub failure: Option<RouteFailure>,
}

impl RoutingState {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            category: None,
            raw_output: None,
            context: None,
            result: None,
            failure: None,
        }
    }

    /// Source label written to the feedback log.
    pub fn source(&self) -> &'static str {
        match (self.failure, self.category) {
            (Some(RouteFailure::HandlerUnavailable), _) => "Error",
            (Some(RouteFailure::Internal), _) => "Router Error",
            (None, Some(category)) => category.label(),
            (None, None) => "Unknown",
        }
    }

    /// Only a successfully retrieved RAG state goes through synthesis.
    pub fn needs_synthesis(&self) -> bool {
        self.category == Some(Category::RetrievalQa) && self.failure.is_none()
    }

    pub fn fail(&mut self, failure: RouteFailure, message: impl Into<String>) {
        self.failure = Some(failure);
        self.result = Some(message.into());
    }
}

/// One row of the feedback log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub timestamp: DateTime<Local>,
    pub source: String,
    pub rating: Option<u8>,
    pub comment: String,
    pub query: String,
}

impl FeedbackRecord {
    pub fn from_state(state: &RoutingState, rating: Option<u8>, comment: &str) -> Self {
        Self {
            timestamp: Local::now(),
            source: state.source().to_string(),
            rating: rating.filter(|r| (1..=5).contains(r)),
            comment: comment.trim().to_string(),
            query: state.query.as_str().to_string(),
        }
    }
}
