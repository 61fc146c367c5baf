use async_trait::async_trait;
use insightbot_core::config::CodeSearchConfig;
use insightbot_core::{Error, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::{http_client, read_json, ToolAdapter, ToolRequest};

/// GitHub REST v3 code search, restricted to one language.
pub struct GitHubCodeSearch {
    client: Client,
    api_base: String,
    token: Option<String>,
    language: String,
    per_page: u32,
}

impl GitHubCodeSearch {
    pub fn new(token: Option<&str>, language: &str, per_page: u32) -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(10))?,
            api_base: "https://api.github.com".to_string(),
            token: token.filter(|t| !t.is_empty()).map(str::to_string),
            language: language.to_string(),
            per_page: per_page.clamp(1, 100),
        })
    }

    pub fn from_config(config: &CodeSearchConfig) -> Result<Self> {
        Self::new(Some(&config.token), &config.language, config.per_page)
    }

    /// Point at a GitHub Enterprise instance.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn search_query(&self, query: &str) -> String {
        if self.language.is_empty() {
            query.to_string()
        } else {
            format!("{} language:{}", query, self.language)
        }
    }
}

/// Render GitHub's `items` as `owner/repo/path` + link pairs.
pub fn format_items(query: &str, data: &Value) -> String {
    let items = data["items"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    if items.is_empty() {
        return format!("No code found for query '{}'.", query);
    }

    items
        .iter()
        .map(|item| {
            let repo = item["repository"]["full_name"].as_str().unwrap_or("unknown");
            let path = item["path"].as_str().unwrap_or("");
            let url = item["html_url"].as_str().unwrap_or("");
            format!("{}/{}\n{}", repo, path, url)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl ToolAdapter for GitHubCodeSearch {
    fn name(&self) -> &'static str {
        "github_code_search"
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<String> {
        let query = request.query()?;
        let q = self.search_query(query);
        info!(query = %q, "GitHub code search");

        let mut req = self
            .client
            .get(format!("{}/search/code", self.api_base))
            .header("Accept", "application/vnd.github.v3+json")
            .query(&[("q", q.as_str()), ("per_page", &self.per_page.to_string())]);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("token {}", token));
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::Tool(format!("GitHub code search failed for '{}': {}", query, e)))?;

        let data = read_json("GitHub", response).await?;
        debug!(total = data["total_count"].as_u64().unwrap_or(0), "GitHub code search completed");
        Ok(format_items(query, &data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_items() {
        let data = json!({
            "total_count": 2,
            "items": [
                {"path": "src/retry.py", "html_url": "https://github.com/a/b/blob/main/src/retry.py",
                 "repository": {"full_name": "a/b"}},
                {"path": "backoff.py", "html_url": "https://github.com/c/d/blob/main/backoff.py",
                 "repository": {"full_name": "c/d"}}
            ]
        });
        let text = format_items("retry decorator", &data);
        assert_eq!(
            text,
            "a/b/src/retry.py\nhttps://github.com/a/b/blob/main/src/retry.py\n\nc/d/backoff.py\nhttps://github.com/c/d/blob/main/backoff.py"
        );
    }

    #[test]
    fn test_no_items() {
        assert_eq!(format_items("x", &json!({"items": []})), "No code found for query 'x'.");
    }

    #[test]
    fn test_language_qualifier() {
        let tool = GitHubCodeSearch::new(None, "python", 3).unwrap();
        assert_eq!(tool.search_query("retry decorator"), "retry decorator language:python");
        let tool = GitHubCodeSearch::new(Some(""), "", 3).unwrap();
        assert_eq!(tool.search_query("retry"), "retry");
        assert!(tool.token.is_none());
    }

    #[tokio::test]
    async fn test_rejects_coordinates() {
        let tool = GitHubCodeSearch::new(None, "python", 3).unwrap();
        let req = ToolRequest::Coordinates(crate::Coordinates { latitude: 0.0, longitude: 0.0 });
        assert!(tool.invoke(&req).await.is_err());
    }
}
