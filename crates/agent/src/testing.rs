//! Scripted stand-ins for the external services, for workflow tests.

use async_trait::async_trait;
use insightbot_core::{Error, FeedbackRecord, Result};
use insightbot_providers::CompletionService;
use insightbot_storage::{FeedbackStore, Retriever};
use insightbot_tools::{Coordinates, Geocoder, Place, ToolAdapter, ToolRequest};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers completions from a queue, recording each prompt.
#[derive(Default)]
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        })
    }

    pub fn answers(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    /// Never answers within any sane deadline.
    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            delay: Some(Duration::from_secs(60)),
            ..Default::default()
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::CompletionCallFailed("script exhausted".to_string())))
    }
}

/// Answers from the prompt itself: classifies by the query's first word and
/// tags refinements and syntheses with the query they were asked about.
pub struct EchoCompletion;

impl EchoCompletion {
    fn query_in(prompt: &str) -> &str {
        prompt
            .lines()
            .find_map(|l| l.strip_prefix("User Query: ").or_else(|| l.strip_prefix("Question: ")))
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionService for EchoCompletion {
    async fn complete(&self, prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
        let query = Self::query_in(prompt);
        // Uneven latency so concurrent cycles interleave.
        tokio::time::sleep(Duration::from_millis((query.len() % 5) as u64 * 3)).await;
        let answer = if prompt.contains("Return only the category name") {
            match query.split_whitespace().next().unwrap_or_default() {
                "weather" => "Weather",
                "code" => "GitHub",
                "news" => "Tavily",
                _ => "RAG",
            }
            .to_string()
        } else if prompt.ends_with("Refined Answer:") {
            format!("refined[{}]", query)
        } else {
            format!("answer[{}]", query)
        };
        Ok(answer)
    }
}

/// Tool adapter with a fixed outcome.
pub struct ScriptedTool {
    outcome: std::result::Result<String, String>,
    requests: Mutex<Vec<ToolRequest>>,
}

impl ScriptedTool {
    pub fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(detail.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ToolRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolAdapter for ScriptedTool {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcome.clone().map_err(Error::Tool)
    }
}

/// Retriever over a fixed passage list, returned in order.
pub struct FixedRetriever {
    passages: Option<Vec<String>>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl FixedRetriever {
    pub fn with(passages: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            passages: Some(passages.iter().map(|p| p.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Reports that no index is loaded.
    pub fn unloaded() -> Arc<Self> {
        Arc::new(Self {
            passages: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push((query.to_string(), k));
        match &self.passages {
            Some(p) => Ok(p.iter().take(k).cloned().collect()),
            None => Err(Error::RetrieverUnavailable),
        }
    }
}

/// Geocoder that knows a handful of places.
pub struct FixedGeocoder {
    places: Vec<(String, Coordinates)>,
    lookups: Mutex<Vec<String>>,
}

impl FixedGeocoder {
    pub fn with(places: &[(&str, f64, f64)]) -> Arc<Self> {
        Arc::new(Self {
            places: places
                .iter()
                .map(|(n, lat, lon)| (n.to_string(), Coordinates { latitude: *lat, longitude: *lon }))
                .collect(),
            lookups: Mutex::new(Vec::new()),
        })
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn locate(&self, place: &str) -> Result<Option<Place>> {
        self.lookups.lock().unwrap().push(place.to_string());
        Ok(self
            .places
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(place))
            .map(|(n, c)| Place {
                name: n.clone(),
                country: None,
                coordinates: *c,
            }))
    }
}

/// In-memory feedback sink.
#[derive(Default)]
pub struct MemoryFeedbackStore {
    records: Mutex<Vec<FeedbackRecord>>,
    fail: bool,
}

impl MemoryFeedbackStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedbackStore for MemoryFeedbackStore {
    async fn append(&self, record: &FeedbackRecord) -> Result<()> {
        if self.fail {
            return Err(Error::Storage("disk full".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
