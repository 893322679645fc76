//! Error type shared by every stage of the ingestion pipeline.
//!
//! Most stages degrade instead of failing (a scrape that errors becomes "no
//! scraped content", a model that errors becomes "no AI enhancement"), so
//! these errors mostly surface in two places: per-source failures when the
//! news API cannot be reached, and per-item failures when an article cannot
//! be persisted.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("news API error: {0}")]
    NewsApi(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),

    #[error("model returned an empty completion")]
    EmptyCompletion,

    #[error("model error: {0}")]
    Model(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("an article with slug `{0}` already exists")]
    DuplicateSlug(String),

    #[error("title `{0}` produces an empty slug")]
    EmptySlug(String),

    #[error("invalid taxonomy: {0}")]
    InvalidTaxonomy(String),

    #[error("processing panicked: {0}")]
    Panicked(String),
}

impl IngestError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Http(_) | IngestError::Model(_) => true,
            IngestError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
