//! Full-text scraping of the pages news headlines link to.
//!
//! The news API only supplies a truncated description and content snippet,
//! so each headline's URL is fetched and mined for its main text.
//!
//! # Layout
//!
//! - [`PageFetcher`]: how raw HTML is obtained ([`HttpFetcher`] in production)
//! - [`extract`]: pure selector heuristics turning HTML into [`ScrapedContent`]
//! - [`Scraper`]: glues the two together and never fails; every problem is
//!   logged and reported as `None` so callers fall back to headline content

pub mod extract;

use crate::config::ScraperConfig;
use crate::error::{IngestError, Result};
use crate::models::ScrapedContent;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use extract::extract_content;

/// Source of raw page HTML.
pub trait PageFetcher {
    /// Fetch `url` and return the response body.
    ///
    /// Non-success HTTP statuses are errors.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// [`PageFetcher`] backed by `reqwest`, identifying as a desktop browser.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[derive(Debug)]
pub struct Scraper<F> {
    fetcher: F,
    max_content_chars: usize,
}

impl<F: PageFetcher> Scraper<F> {
    pub fn new(fetcher: F, max_content_chars: usize) -> Self {
        Self {
            fetcher,
            max_content_chars,
        }
    }

    /// Fetch `url` and extract its main content.
    ///
    /// # Arguments
    ///
    /// * `url` - The headline's article URL; only `http` and `https` are fetched
    ///
    /// # Returns
    ///
    /// `Some` with the page title and bounded main text, or `None` for
    /// unsupported URLs, fetch failures and thin pages. Never an error; the
    /// caller falls back to the headline's own content.
    #[instrument(level = "info", skip(self))]
    pub async fn scrape(&self, url: &str) -> Option<ScrapedContent> {
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                warn!(scheme = parsed.scheme(), "Unsupported URL scheme; not scraping");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Invalid article URL; not scraping");
                return None;
            }
        }

        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Page fetch failed");
                return None;
            }
        };
        debug!(bytes = html.len(), "Fetched article page");

        match extract_content(&html, self.max_content_chars) {
            Some(scraped) => {
                info!(
                    chars = scraped.content.chars().count(),
                    page_title = %scraped.title,
                    "Scraped article content"
                );
                Some(scraped)
            }
            None => {
                warn!("Page produced no usable content");
                None
            }
        }
    }
}
