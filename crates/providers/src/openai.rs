use async_trait::async_trait;
use insightbot_core::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::client::build_http_client;
use crate::CompletionService;

/// Find the largest byte index <= `max_bytes` that is a valid char boundary.
fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> usize {
    if max_bytes >= s.len() {
        return s.len();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Chat-completions client for any OpenAI-compatible endpoint
/// (Groq, OpenAI, Ollama's `/v1`, vLLM, ...).
pub struct OpenAICompatProvider {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAICompatProvider {
    pub fn new(api_key: &str, api_base: Option<&str>, model: &str) -> Self {
        Self::new_with_proxy(api_key, api_base, model, None, None, &[])
    }

    pub fn new_with_proxy(
        api_key: &str,
        api_base: Option<&str>,
        model: &str,
        endpoint_proxy: Option<&str>,
        global_proxy: Option<&str>,
        no_proxy: &[String],
    ) -> Self {
        let resolved_base = api_base
            .unwrap_or("https://api.openai.com/v1")
            .trim_end_matches('/')
            .to_string();
        let client = build_http_client(
            endpoint_proxy,
            global_proxy,
            no_proxy,
            &resolved_base,
            Duration::from_secs(120),
        );
        Self {
            client,
            api_key: api_key.to_string(),
            api_base: resolved_base,
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, prompt: &str, max_tokens: u32, temperature: f32) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![RequestMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens,
            temperature,
        }
    }
}

/// Pull the first choice's text out of a raw response body.
fn parse_completion(raw_body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(raw_body).map_err(|e| {
        let end = truncate_at_char_boundary(raw_body, 500);
        Error::CompletionCallFailed(format!("Failed to parse response: {}. Body: {}", e, &raw_body[..end]))
    })?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    if content.is_empty() {
        return Err(Error::CompletionCallFailed("Empty completion".to_string()));
    }
    Ok(content)
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<RequestMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionService for OpenAICompatProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);
        let request = self.build_request(prompt, max_tokens, temperature);

        info!(url = %url, model = %self.model, max_tokens, "Calling LLM");
        let started = Instant::now();

        let mut req = self.client.post(&url).json(&request);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::CompletionCallFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let end = truncate_at_char_boundary(&raw_body, 500);
            error!(status = %status, body = %&raw_body[..end], "LLM API error");
            return Err(Error::CompletionCallFailed(format!("API error {}: {}", status, &raw_body[..end])));
        }

        debug!(body_len = raw_body.len(), "LLM raw response");
        let content = parse_completion(&raw_body)?;
        info!(
            model = %self.model,
            duration_ms = started.elapsed().as_millis() as u64,
            "LLM completion received"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_trims_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Weather\n"}},{"message":{"content":"RAG"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Weather");
    }

    #[test]
    fn test_parse_completion_empty_is_call_failure() {
        let body = r#"{"choices":[{"message":{"content":"   "}}]}"#;
        assert!(matches!(parse_completion(body), Err(Error::CompletionCallFailed(_))));
        let body = r#"{"choices":[]}"#;
        assert!(matches!(parse_completion(body), Err(Error::CompletionCallFailed(_))));
    }

    #[test]
    fn test_parse_completion_malformed_body() {
        let err = parse_completion("<html>bad gateway</html>").unwrap_err();
        match err {
            Error::CompletionCallFailed(msg) => assert!(msg.contains("bad gateway")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_request_shape() {
        let provider = OpenAICompatProvider::new("k", Some("https://api.groq.com/openai/v1/"), "llama");
        let req = provider.build_request("hello", 20, 0.0);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "llama");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["max_tokens"], 20);
        assert_eq!(provider.api_base, "https://api.groq.com/openai/v1");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let s = "héllo";
        assert_eq!(truncate_at_char_boundary(s, 2), 1);
        assert_eq!(truncate_at_char_boundary(s, 100), s.len());
    }
}
