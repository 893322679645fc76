//! Run configuration loaded from `config.yaml`.
//!
//! Every section has defaults, so an empty file (or no file at all) gives a
//! working configuration apart from credentials. CLI flags are layered on top
//! with [`Config::apply_cli`].
//!
//! ```yaml
//! news_api:
//!   base_url: https://newsapi.org/v2
//!   page_size: 20
//! sources:
//!   - id: bbc-news
//!   - id: reuters
//!     name: Reuters
//! model:
//!   model: gemini-2.0-flash
//!   temperature: 0.7
//! store:
//!   dir: ./articles
//! slug_policy: suffix
//! ```

use crate::cli::Cli;
use crate::error::Result;
use crate::ingest::SlugPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub news_api: NewsApiConfig,
    pub sources: Vec<SourceConfig>,
    pub model: ModelConfig,
    pub scraper: ScraperConfig,
    pub store: StoreConfig,
    pub slug_policy: SlugPolicy,
    /// Optional taxonomy YAML; the built-in taxonomy is used otherwise.
    pub taxonomy: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsApiConfig {
    pub base_url: String,
    pub page_size: usize,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://newsapi.org/v2".to_string(),
            page_size: 20,
            api_key: None,
        }
    }
}

/// A news source to ingest, identified by the news API's source id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl SourceConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Generative model endpoint and generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub max_retries: usize,
    pub base_delay_ms: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
            max_retries: 3,
            base_delay_ms: 1000,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_content_chars: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            timeout_secs: 15,
            max_content_chars: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: "./articles".to_string(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = Self::from_yaml_str(&yaml)?;
        info!(sources = config.sources.len(), "Loaded configuration");
        Ok(config)
    }

    /// Layer command line overrides on top of the file configuration.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(dir) = &cli.store_dir {
            self.store.dir = dir.clone();
        }
        if let Some(path) = &cli.taxonomy {
            self.taxonomy = Some(PathBuf::from(path));
        }
        if let Some(sources) = &cli.sources {
            self.sources = sources.iter().cloned().map(SourceConfig::new).collect();
        }
        if let Some(page_size) = cli.page_size {
            self.news_api.page_size = page_size;
        }
        if let Some(policy) = cli.slug_policy {
            self.slug_policy = policy;
        }
        if cli.news_api_key.is_some() {
            self.news_api.api_key = cli.news_api_key.clone();
        }
        if cli.gemini_api_key.is_some() {
            self.model.api_key = cli.gemini_api_key.clone();
        }
    }
}
