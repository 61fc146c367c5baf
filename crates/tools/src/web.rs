use async_trait::async_trait;
use insightbot_core::config::WebSearchConfig;
use insightbot_core::{Error, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::{http_client, read_json, ToolAdapter, ToolRequest};

const TAVILY_URL: &str = "https://api.tavily.com/search";

/// Web search through the Tavily Search API.
pub struct TavilySearch {
    client: Client,
    api_key: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn new(api_key: &str, max_results: usize) -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(15))?,
            api_key: api_key.to_string(),
            max_results: max_results.clamp(1, 10),
        })
    }

    pub fn from_config(config: &WebSearchConfig) -> Result<Self> {
        Self::new(&config.api_key, config.max_results as usize)
    }
}

/// Render Tavily's `results` array as numbered title/content/url blocks.
pub fn format_results(query: &str, data: &Value, max_results: usize) -> String {
    let results = data["results"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    if results.is_empty() {
        return format!("No results found for '{}'.", query);
    }

    results
        .iter()
        .take(max_results)
        .enumerate()
        .map(|(i, item)| {
            let title = item["title"].as_str().filter(|t| !t.is_empty()).unwrap_or("Untitled");
            let content = item["content"].as_str().unwrap_or("");
            let url = item["url"].as_str().unwrap_or("");
            format!("{}. **{}**\n{}\n{}", i + 1, title, content, url)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl ToolAdapter for TavilySearch {
    fn name(&self) -> &'static str {
        "tavily_search"
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<String> {
        let query = request.query()?;
        if self.api_key.is_empty() {
            return Err(Error::Tool("TAVILY_API_KEY missing from configuration".to_string()));
        }

        info!(query = %query, "Tavily search");
        let response = self
            .client
            .post(TAVILY_URL)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": self.max_results,
            }))
            .send()
            .await
            .map_err(|e| Error::Tool(format!("Tavily search failed for '{}': {}", query, e)))?;

        let data = read_json("Tavily", response).await?;
        debug!(results = data["results"].as_array().map_or(0, |r| r.len()), "Tavily search completed");
        Ok(format_results(query, &data, self.max_results))
    }
}
