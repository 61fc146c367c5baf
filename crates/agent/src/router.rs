use insightbot_core::config::{RouterConfig, WeatherConfig};
use insightbot_core::{Category, Error, Query, Result, RouteFailure, RoutingState};
use insightbot_tools::{extract_place, Coordinates, ToolAdapter, ToolRequest};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::capabilities::{bounded, timed_completion, Capabilities};
use crate::intent::IntentClassifier;

pub const RETRIEVER_UNAVAILABLE: &str = "Retriever not available.";

/// Classifies a query and runs exactly one handler for it.
pub struct Router {
    classifier: IntentClassifier,
    capabilities: Capabilities,
    config: RouterConfig,
    weather: WeatherConfig,
}

impl Router {
    pub fn new(capabilities: Capabilities, config: RouterConfig, weather: WeatherConfig) -> Self {
        Self {
            classifier: IntentClassifier::new(capabilities.completion.clone(), &config),
            capabilities,
            config,
            weather,
        }
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Never fails: handler problems end up in `state.result` and `state.failure`.
    pub async fn route(&self, mut state: RoutingState) -> RoutingState {
        let category = self.classifier.classify(&state.query).await;
        state.category = Some(category);
        info!(category = %category, "Routed");

        if let Err(e) = self.dispatch(category, &mut state).await {
            match e {
                Error::RetrieverUnavailable => {
                    warn!("Retriever reported no index loaded");
                    state.fail(RouteFailure::HandlerUnavailable, RETRIEVER_UNAVAILABLE);
                }
                other => {
                    error!(category = %category, error = %other, "Router error");
                    state.fail(RouteFailure::Internal, format!("Router error: {}", other));
                }
            }
        }
        state
    }

    async fn dispatch(&self, category: Category, state: &mut RoutingState) -> Result<()> {
        match category {
            Category::RetrievalQa => self.retrieve_context(state).await,
            Category::Weather => self.run_tool(category, self.capabilities.weather.as_ref(), state).await,
            Category::WebSearch => self.run_tool(category, self.capabilities.web_search.as_ref(), state).await,
            Category::CodeSearch => self.run_tool(category, self.capabilities.code_search.as_ref(), state).await,
        }
    }

    async fn retrieve_context(&self, state: &mut RoutingState) -> Result<()> {
        let Some(retriever) = &self.capabilities.retriever else {
            warn!("No retriever configured");
            state.fail(RouteFailure::HandlerUnavailable, RETRIEVER_UNAVAILABLE);
            return Ok(());
        };

        let passages = bounded(
            "retrieve",
            self.config.call_timeout(),
            retriever.retrieve(state.query.as_str(), self.config.top_k),
        )
        .await?;
        info!(passages = passages.len(), top_k = self.config.top_k, "Context retrieved");
        state.context = Some(passages.join(self.config.context_separator.as_str()));
        Ok(())
    }

    async fn run_tool(
        &self,
        category: Category,
        adapter: Option<&Arc<dyn ToolAdapter>>,
        state: &mut RoutingState,
    ) -> Result<()> {
        let Some(adapter) = adapter else {
            warn!(category = %category, "No adapter configured");
            state.fail(
                RouteFailure::HandlerUnavailable,
                format!("{} tool not available.", category.label()),
            );
            return Ok(());
        };

        let request = if category == Category::Weather {
            ToolRequest::Coordinates(self.weather_coordinates(&state.query).await)
        } else {
            ToolRequest::Query(state.query.as_str().to_string())
        };

        let raw = bounded(adapter.name(), self.config.call_timeout(), adapter.invoke(&request)).await?;
        debug!(tool = adapter.name(), chars = raw.len(), "Tool returned");
        let result = self.refine(&state.query, &raw).await;
        state.raw_output = Some(raw);
        state.result = Some(result);
        Ok(())
    }

    /// Coordinates for a weather query: the geocoded place named in the
    /// query, otherwise the configured default.
    pub async fn weather_coordinates(&self, query: &Query) -> Coordinates {
        let fallback = Coordinates {
            latitude: self.weather.default_latitude,
            longitude: self.weather.default_longitude,
        };

        let geocoder = match (&self.capabilities.geocoder, self.weather.geocode) {
            (Some(g), true) => g,
            _ => {
                info!(%fallback, "Geocoding disabled, using default coordinates");
                return fallback;
            }
        };
        let Some(place) = extract_place(query.as_str()) else {
            info!(%fallback, "No place named in query, using default coordinates");
            return fallback;
        };

        match bounded("geocode", self.config.call_timeout(), geocoder.locate(&place)).await {
            Ok(Some(found)) => {
                info!(place = %place, resolved = %found.name, at = %found.coordinates, "Place geocoded");
                found.coordinates
            }
            Ok(None) => {
                warn!(place = %place, %fallback, "Place not found, using default coordinates");
                fallback
            }
            Err(e) => {
                warn!(place = %place, error = %e, %fallback, "Geocoding failed, using default coordinates");
                fallback
            }
        }
    }

    pub fn refine_prompt(query: &Query, raw: &str) -> String {
        format!(
            "You are a helpful assistant. Improve clarity and tone of the result.\n\n\
             User Query: {}\n\
             Tool Output: {}\n\n\
             Refined Answer:",
            query, raw
        )
    }

    /// Best-effort rewrite of a tool result. Any failure keeps the raw text.
    async fn refine(&self, query: &Query, raw: &str) -> String {
        if raw.trim().is_empty() {
            return raw.to_string();
        }
        let Some(service) = &self.capabilities.completion else {
            return raw.to_string();
        };

        match timed_completion(
            service.as_ref(),
            "refine",
            &Self::refine_prompt(query, raw),
            self.config.refine_max_tokens,
            self.config.temperature,
            self.config.call_timeout(),
        )
        .await
        {
            Ok(text) if !text.trim().is_empty() => {
                debug!("Refinement applied");
                text.trim().to_string()
            }
            Ok(_) => {
                warn!("Refinement returned empty text, keeping tool output");
                raw.to_string()
            }
            Err(e) => {
                warn!(error = %e, "Refinement failed, keeping tool output");
                raw.to_string()
            }
        }
    }
}
