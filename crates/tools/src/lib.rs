pub mod github;
pub mod weather;
pub mod web;

use async_trait::async_trait;
use insightbot_core::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use github::GitHubCodeSearch;
pub use weather::{extract_place, OpenMeteoGeocoder, OpenMeteoWeather};
pub use web::TavilySearch;

/// Truncate a string to at most `max_chars` bytes, respecting UTF-8 char boundaries.
pub fn safe_truncate(s: &str, max_chars: usize) -> &str {
    if s.len() <= max_chars {
        return s;
    }
    let mut end = max_chars;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lat={}, lon={}", self.latitude, self.longitude)
    }
}

/// Input handed to a tool adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    Query(String),
    Coordinates(Coordinates),
}

impl ToolRequest {
    pub fn query(&self) -> Result<&str> {
        match self {
            ToolRequest::Query(q) => Ok(q),
            ToolRequest::Coordinates(_) => Err(Error::Tool("expected a text query".to_string())),
        }
    }

    pub fn coordinates(&self) -> Result<Coordinates> {
        match self {
            ToolRequest::Coordinates(c) => Ok(*c),
            ToolRequest::Query(_) => Err(Error::Tool("expected coordinates".to_string())),
        }
    }
}

/// A stateless wrapper around one external service.
///
/// "Nothing found" is a successful, human-readable answer; `Error::Tool` is
/// reserved for network, auth and response-format failures.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn name(&self) -> &'static str;
    async fn invoke(&self, request: &ToolRequest) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub name: String,
    pub country: Option<String>,
    pub coordinates: Coordinates,
}

/// Resolves a free-text place name to coordinates. `Ok(None)` means the
/// service answered but knows no such place.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn locate(&self, place: &str) -> Result<Option<Place>>;
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("insightbot/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Tool(format!("Failed to create HTTP client: {}", e)))
}

/// Shared status/JSON handling for adapter responses.
pub(crate) async fn read_json(service: &str, response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(Error::Tool(format!(
            "{} API error {}: {}",
            service,
            status,
            safe_truncate(&text, 300)
        )));
    }
    response
        .json()
        .await
        .map_err(|e| Error::Tool(format!("Failed to parse {} response: {}", service, e)))
}
