use insightbot_agent::{Capabilities, FeedbackCollector, FeedbackSource, WorkflowEngine};
use insightbot_core::{Config, Error, Paths};
use insightbot_providers::create_completion_service;
use insightbot_storage::{CsvFeedbackStore, PassageIndex, Retriever};
use insightbot_tools::{GitHubCodeSearch, Geocoder, OpenMeteoGeocoder, OpenMeteoWeather, TavilySearch, ToolAdapter};
use std::sync::Arc;
use tracing::{info, warn};

/// Build every capability the config allows. Missing pieces are logged and
/// left out; the workflow degrades around them.
pub fn build_capabilities(config: &Config, paths: &Paths) -> anyhow::Result<Capabilities> {
    let completion = create_completion_service(config)?;

    let web_search: Option<Arc<dyn ToolAdapter>> = if config.tools.web_search.api_key.is_empty() {
        warn!("TAVILY_API_KEY not set, web search disabled");
        None
    } else {
        Some(Arc::new(TavilySearch::from_config(&config.tools.web_search)?))
    };

    let code_search: Arc<dyn ToolAdapter> = Arc::new(GitHubCodeSearch::from_config(&config.tools.code_search)?);
    let weather: Arc<dyn ToolAdapter> = Arc::new(OpenMeteoWeather::new()?);
    let geocoder: Option<Arc<dyn Geocoder>> = if config.tools.weather.geocode {
        Some(Arc::new(OpenMeteoGeocoder::new()?))
    } else {
        None
    };

    let index_path = config.index_path(paths);
    let retriever: Option<Arc<dyn Retriever>> = match PassageIndex::open(&index_path) {
        Ok(index) => {
            info!(path = %index_path.display(), passages = index.count().unwrap_or(0), "Passage index loaded");
            Some(Arc::new(index))
        }
        Err(Error::RetrieverUnavailable) => {
            warn!(path = %index_path.display(), "No passage index, run `insightbot index import` to build one");
            None
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Capabilities {
        completion,
        web_search,
        code_search: Some(code_search),
        weather: Some(weather),
        geocoder,
        retriever,
    })
}

pub fn build_engine(feedback: Arc<dyn FeedbackSource>) -> anyhow::Result<(WorkflowEngine, Config)> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let capabilities = build_capabilities(&config, &paths)?;

    let feedback_path = config.feedback_path(&paths);
    info!(path = %feedback_path.display(), "Feedback log");
    let collector = FeedbackCollector::new(Arc::new(CsvFeedbackStore::new(feedback_path)));

    let engine = WorkflowEngine::new(capabilities, &config, collector).with_feedback_source(feedback);
    Ok((engine, config))
}
