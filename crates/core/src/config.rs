use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    /// `None` follows `network.proxy`; `Some("")` forces a direct connection.
    #[serde(default)]
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_llm_provider() -> String {
    "groq".to_string()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    /// Passages pulled from the index for a RAG query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_classify_max_tokens")]
    pub classify_max_tokens: u32,
    #[serde(default = "default_refine_max_tokens")]
    pub refine_max_tokens: u32,
    #[serde(default = "default_synthesis_max_tokens")]
    pub synthesis_max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    /// Upper bound for any single completion, tool or retriever call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_context_separator")]
    pub context_separator: String,
}

fn default_top_k() -> usize {
    3
}

fn default_classify_max_tokens() -> u32 {
    20
}

fn default_refine_max_tokens() -> u32 {
    250
}

fn default_synthesis_max_tokens() -> u32 {
    350
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_context_separator() -> String {
    "\n".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            classify_max_tokens: default_classify_max_tokens(),
            refine_max_tokens: default_refine_max_tokens(),
            synthesis_max_tokens: default_synthesis_max_tokens(),
            temperature: 0.0,
            call_timeout_secs: default_call_timeout_secs(),
            context_separator: default_context_separator(),
        }
    }
}

impl RouterConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_max_results() -> u32 {
    3
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSearchConfig {
    /// GitHub token. Anonymous search works but is heavily rate limited.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_code_language")]
    pub language: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_code_language() -> String {
    "python".to_string()
}

fn default_per_page() -> u32 {
    3
}

impl Default for CodeSearchConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            language: default_code_language(),
            per_page: default_per_page(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherConfig {
    #[serde(default = "default_latitude")]
    pub default_latitude: f64,
    #[serde(default = "default_longitude")]
    pub default_longitude: f64,
    /// Resolve place names in the query through the geocoding API.
    #[serde(default = "default_geocode")]
    pub geocode: bool,
}

fn default_latitude() -> f64 {
    12.97
}

fn default_longitude() -> f64 {
    77.59
}

fn default_geocode() -> bool {
    true
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            default_latitude: default_latitude(),
            default_longitude: default_longitude(),
            geocode: default_geocode(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub code_search: CodeSearchConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    #[serde(default)]
    pub index_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackConfig {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

fn default_gateway_host() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub no_proxy: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert("groq".to_string(), ProviderConfig::default());
        providers.insert("openai".to_string(), ProviderConfig::default());
        providers.insert("ollama".to_string(), ProviderConfig {
            api_key: String::new(),
            api_base: Some("http://localhost:11434/v1".to_string()),
            proxy: None,
        });

        Self {
            providers,
            llm: LlmConfig::default(),
            router: RouterConfig::default(),
            tools: ToolsConfig::default(),
            retrieval: RetrievalConfig::default(),
            feedback: FeedbackConfig::default(),
            gateway: GatewayConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

/// Environment variables that fill in provider keys left empty in the file.
const PROVIDER_KEY_ENV: &[(&str, &str)] = &[("groq", "GROQ_API_KEY"), ("openai", "OPENAI_API_KEY")];

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        let mut config = if config_path.exists() {
            Self::load(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Fill empty secrets from the environment. Values present in the file win.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        for (provider, env_key) in PROVIDER_KEY_ENV {
            if let Some(value) = non_empty(env_key) {
                let entry = self.providers.entry(provider.to_string()).or_default();
                if entry.api_key.is_empty() {
                    debug!(provider = %provider, env = %env_key, "Provider key taken from environment");
                    entry.api_key = value;
                }
            }
        }
        if self.tools.web_search.api_key.is_empty() {
            if let Some(value) = non_empty("TAVILY_API_KEY") {
                self.tools.web_search.api_key = value;
            }
        }
        if self.tools.code_search.token.is_empty() {
            if let Some(value) = non_empty("GITHUB_TOKEN") {
                self.tools.code_search.token = value;
            }
        }
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    pub fn index_path(&self, paths: &Paths) -> PathBuf {
        match self.retrieval.index_path.as_deref() {
            Some(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => paths.index_db(),
        }
    }

    pub fn feedback_path(&self, paths: &Paths) -> PathBuf {
        match self.feedback.path.as_deref() {
            Some(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => paths.feedback_log(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.llm.provider, "groq");
        assert_eq!(cfg.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(cfg.router.top_k, 3);
        assert_eq!(cfg.router.classify_max_tokens, 20);
        assert_eq!(cfg.router.refine_max_tokens, 250);
        assert_eq!(cfg.router.synthesis_max_tokens, 350);
        assert_eq!(cfg.router.context_separator, "\n");
        assert_eq!(cfg.tools.weather.default_latitude, 12.97);
        assert_eq!(cfg.tools.weather.default_longitude, 77.59);
        assert_eq!(cfg.gateway.port, 8080);
    }

    #[test]
    fn test_camel_case_fields() {
        let raw = r#"{
  "router": { "topK": 5, "callTimeoutSecs": 7 },
  "tools": { "codeSearch": { "language": "rust", "perPage": 10 } },
  "providers": { "groq": { "apiKey": "gsk-file" } }
}"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.router.top_k, 5);
        assert_eq!(cfg.router.call_timeout(), Duration::from_secs(7));
        assert_eq!(cfg.tools.code_search.language, "rust");
        assert_eq!(cfg.tools.code_search.per_page, 10);
        assert_eq!(cfg.get_provider("groq").unwrap().api_key, "gsk-file");
    }

    #[test]
    fn test_env_fills_only_empty_values() {
        let raw = r#"{ "providers": { "groq": { "apiKey": "gsk-file" } } }"#;
        let mut cfg: Config = serde_json::from_str(raw).unwrap();
        cfg.apply_env(|key| match key {
            "GROQ_API_KEY" => Some("gsk-env".to_string()),
            "OPENAI_API_KEY" => Some("sk-env".to_string()),
            "TAVILY_API_KEY" => Some("tvly-env".to_string()),
            "GITHUB_TOKEN" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(cfg.get_provider("groq").unwrap().api_key, "gsk-file");
        assert_eq!(cfg.get_provider("openai").unwrap().api_key, "sk-env");
        assert_eq!(cfg.tools.web_search.api_key, "tvly-env");
        assert!(cfg.tools.code_search.token.is_empty());
    }

    #[test]
    fn test_artifact_paths_default_under_home() {
        let paths = Paths::with_base(PathBuf::from("/srv/bot"));
        let mut cfg = Config::default();
        assert_eq!(cfg.index_path(&paths), PathBuf::from("/srv/bot/artifacts/index.db"));
        cfg.feedback.path = Some("/data/fb.csv".to_string());
        assert_eq!(cfg.feedback_path(&paths), PathBuf::from("/data/fb.csv"));
    }

    #[test]
    fn test_save_and_load_roundtrip_preserves_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut cfg = Config::default();
        cfg.router.top_k = 7;
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.router.top_k, 7);
    }
}
