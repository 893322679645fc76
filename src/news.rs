//! Headline discovery through the news source API.
//!
//! Each configured source id is asked for its current top headlines via
//! [NewsAPI](https://newsapi.org/docs/endpoints/top-headlines). The API key
//! is sent in the `X-Api-Key` header and never appears in URLs or logs.

use crate::config::NewsApiConfig;
use crate::error::{IngestError, Result};
use crate::models::RawHeadline;
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Title NewsAPI substitutes for articles that were taken down.
pub const REMOVED_TITLE: &str = "[Removed]";

/// Source of candidate headlines.
pub trait NewsSource {
    async fn fetch_headlines(&self, source_id: &str, page_size: usize) -> Result<Vec<RawHeadline>>;
}

/// Whether a headline carries enough to be worth processing.
///
/// Takedown placeholders and items without a title or description are
/// discarded before any scraping or model call.
pub fn is_eligible(headline: &RawHeadline) -> bool {
    let title = headline.title.trim();
    let has_description = headline
        .description
        .as_deref()
        .is_some_and(|d| !d.trim().is_empty());
    !title.is_empty() && title != REMOVED_TITLE && has_description
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    #[serde(default)]
    source: NewsApiSource,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NewsApiSource {
    id: Option<String>,
    name: Option<String>,
}

impl NewsApiArticle {
    fn into_headline(self, requested_source: &str) -> RawHeadline {
        let source_id = self
            .source
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| requested_source.to_string());
        let source_name = self.source.name.unwrap_or_else(|| source_id.clone());
        RawHeadline {
            source_id,
            source_name,
            title: self.title.unwrap_or_default(),
            description: self.description,
            content: self.content,
            url: self.url,
            author: self.author,
            published_at: self.published_at.unwrap_or_default(),
            url_to_image: self.url_to_image,
        }
    }
}

fn parse_response(body: &str, source_id: &str) -> Result<Vec<RawHeadline>> {
    let response: NewsApiResponse = serde_json::from_str(body)?;
    if response.status != "ok" {
        let code = response.code.unwrap_or_else(|| "unknown".to_string());
        let message = response.message.unwrap_or_default();
        return Err(IngestError::NewsApi(format!("{code}: {message}")));
    }
    Ok(response
        .articles
        .into_iter()
        .map(|a| a.into_headline(source_id))
        .collect())
}

/// Error for a non-success response. NewsAPI usually explains 4xx replies
/// with a `{"status":"error","code":..,"message":..}` body; anything else
/// keeps the bare status.
fn error_for_status(url: String, status: u16, body: &str) -> IngestError {
    match serde_json::from_str::<NewsApiResponse>(body) {
        Ok(NewsApiResponse {
            code: Some(code),
            message,
            ..
        }) => IngestError::NewsApi(format!("{code}: {}", message.unwrap_or_default())),
        _ => IngestError::Status { url, status },
    }
}

/// [`NewsSource`] backed by the NewsAPI `top-headlines` endpoint.
pub struct NewsApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

impl NewsApiClient {
    pub fn new(config: &NewsApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    fn headlines_url(&self, source_id: &str, page_size: usize) -> String {
        format!(
            "{}/top-headlines?sources={}&pageSize={}",
            self.base_url,
            urlencoding::encode(source_id),
            page_size
        )
    }
}

impl NewsSource for NewsApiClient {
    #[instrument(level = "info", skip(self))]
    async fn fetch_headlines(&self, source_id: &str, page_size: usize) -> Result<Vec<RawHeadline>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(IngestError::MissingCredentials("NEWS_API_KEY"));
        };

        let url = self.headlines_url(source_id, page_size);
        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", api_key)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                body_preview = %truncate_for_log(&body, 300),
                "News API request failed"
            );
            return Err(error_for_status(url, status.as_u16(), &body));
        }

        let headlines = parse_response(&body, source_id)?;
        info!(count = headlines.len(), "Fetched headlines");
        debug!(titles = ?headlines.iter().map(|h| &h.title).collect::<Vec<_>>(), "Headline titles");
        Ok(headlines)
    }
}
