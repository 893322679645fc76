//! Ingestion orchestrator.
//!
//! For every configured source: fetch headlines, drop ineligible ones, then
//! for each remaining headline scrape the page, ask the model to restructure
//! it, assemble the article and persist it. Sources and items run one after
//! another; the scrape and model calls are the rate-limited resources.
//!
//! Failures never escape [`Ingestor::run`]. A source whose headlines cannot
//! be fetched becomes [`SourceOutcome::Failed`]; an item that cannot be
//! persisted (or panics) becomes an [`ItemFailure`] while its siblings carry
//! on.

use crate::api::AskAsync;
use crate::assemble::{assemble, best_content, clean_title};
use crate::classifier::KeywordClassifier;
use crate::config::SourceConfig;
use crate::error::{IngestError, Result};
use crate::json_repair::extract_json;
use crate::models::{Article, IngestReport, ItemFailure, RawHeadline, SourceOutcome};
use crate::news::{NewsSource, is_eligible};
use crate::prompt::{PromptInput, build_prompt};
use crate::scrapers::{PageFetcher, Scraper};
use crate::store::ArticleStore;
use crate::taxonomy::Taxonomy;
use chrono::Utc;
use clap::ValueEnum;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, instrument, warn};

/// What to do when an assembled article's slug is already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SlugPolicy {
    /// Replace the stored article.
    #[default]
    Overwrite,
    /// Record the item as failed with [`IngestError::DuplicateSlug`].
    Reject,
    /// Store under the first free `<slug>-2`, `<slug>-3`, ...
    Suffix,
}

#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    pub page_size: usize,
    pub slug_policy: SlugPolicy,
}

pub struct Ingestor<'t, N, F, M, S> {
    news: N,
    scraper: Scraper<F>,
    model: M,
    store: S,
    taxonomy: &'t Taxonomy,
    settings: IngestSettings,
}

impl<'t, N, F, M, S> Ingestor<'t, N, F, M, S>
where
    N: NewsSource,
    F: PageFetcher,
    M: AskAsync,
    S: ArticleStore,
{
    pub fn new(
        news: N,
        scraper: Scraper<F>,
        model: M,
        store: S,
        taxonomy: &'t Taxonomy,
        settings: IngestSettings,
    ) -> Self {
        Self {
            news,
            scraper,
            model,
            store,
            taxonomy,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ingest every source in order and report what happened to each.
    ///
    /// # Arguments
    ///
    /// * `sources` - Configured news sources, processed one after another
    ///
    /// # Returns
    ///
    /// One [`SourceOutcome`] per source, in order. Never fails; fetch errors
    /// and item errors are recorded in the outcomes.
    pub async fn run(&self, sources: &[SourceConfig]) -> IngestReport {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(sources.len());
        for source in sources {
            outcomes.push(self.ingest_source(source).await);
        }
        IngestReport {
            started_at,
            finished_at: Utc::now(),
            sources: outcomes,
        }
    }

    #[instrument(level = "info", skip_all, fields(source = %source.id))]
    async fn ingest_source(&self, source: &SourceConfig) -> SourceOutcome {
        info!(name = %source.display_name(), "Fetching headlines");
        let headlines = match self
            .news
            .fetch_headlines(&source.id, self.settings.page_size)
            .await
        {
            Ok(headlines) => headlines,
            Err(e) => {
                error!(error = %e, "Failed to fetch headlines; skipping source");
                return SourceOutcome::Failed {
                    source: source.id.clone(),
                    error: e.to_string(),
                };
            }
        };

        let total = headlines.len();
        let eligible: Vec<RawHeadline> = headlines.into_iter().filter(is_eligible).collect();
        let skipped = total - eligible.len();
        info!(total, eligible = eligible.len(), skipped, "Filtered headlines");

        let mut articles_added = 0;
        let mut failures = Vec::new();
        for (i, headline) in eligible.iter().enumerate() {
            info!(n = i + 1, of = eligible.len(), title = %headline.title, "Processing headline");
            match self.guarded(headline).await {
                Ok(article) => {
                    articles_added += 1;
                    info!(slug = %article.slug, tag = %article.tag, region = %article.region, "Stored article");
                }
                Err(e) => {
                    error!(title = %headline.title, error = %e, "Headline failed");
                    failures.push(ItemFailure {
                        title: headline.title.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(articles_added, failed = failures.len(), "Source complete");
        SourceOutcome::Completed {
            source: source.id.clone(),
            articles_added,
            skipped,
            failures,
        }
    }

    async fn guarded(&self, headline: &RawHeadline) -> Result<Article> {
        AssertUnwindSafe(self.process_headline(headline))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(IngestError::Panicked(panic_message(panic.as_ref()))))
    }

    /// Scrape, enhance, assemble and persist one headline.
    pub async fn process_headline(&self, headline: &RawHeadline) -> Result<Article> {
        let scraped = match headline.url.as_deref() {
            Some(url) => self.scraper.scrape(url).await,
            None => {
                debug!("Headline has no URL; not scraping");
                None
            }
        };

        let content = best_content(headline, scraped.as_ref());
        let ai = self.enhance(headline, &content).await;
        if ai.is_none() {
            warn!("No AI enhancement; falling back to classifier and raw content");
        }

        let article = assemble(headline, scraped.as_ref(), ai.as_ref(), self.taxonomy);
        if article.slug.is_empty() {
            return Err(IngestError::EmptySlug(article.title));
        }
        self.persist(article).await
    }

    async fn enhance(&self, headline: &RawHeadline, content: &str) -> Option<Value> {
        let title = clean_title(&headline.title, &headline.source_name);
        let classified_text = format!(
            "{} {} {}",
            title,
            headline.description.as_deref().unwrap_or_default(),
            content
        );
        let region = KeywordClassifier::new(self.taxonomy)
            .classify_region(&classified_text)
            .unwrap_or(self.taxonomy.default_region());

        let prompt = build_prompt(
            &PromptInput {
                title: &title,
                content,
                source_name: &headline.source_name,
                region,
            },
            self.taxonomy,
        );
        debug!(prompt_chars = prompt.chars().count(), %region, "Asking model");

        match self.model.ask(&prompt).await {
            Ok(text) if !text.trim().is_empty() => extract_json(&text),
            Ok(_) => {
                warn!("Model returned empty text");
                None
            }
            Err(e) => {
                warn!(error = %e, "Model call failed");
                None
            }
        }
    }

    async fn persist(&self, mut article: Article) -> Result<Article> {
        match self.settings.slug_policy {
            SlugPolicy::Overwrite => {}
            SlugPolicy::Reject => {
                if self.store.exists(&article.slug).await? {
                    return Err(IngestError::DuplicateSlug(article.slug));
                }
            }
            SlugPolicy::Suffix => {
                let free = self.free_slug(&article.slug).await?;
                if free != article.slug {
                    debug!(from = %article.slug, to = %free, "Slug taken; using suffix");
                    article.slug = free;
                }
            }
        }
        self.store.create(&article).await?;
        Ok(article)
    }

    async fn free_slug(&self, base: &str) -> Result<String> {
        if !self.store.exists(base).await? {
            return Ok(base.to_string());
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !self.store.exists(&candidate).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeNews {
        feeds: HashMap<String, Vec<RawHeadline>>,
    }

    impl FakeNews {
        fn with_feed(mut self, source: &str, headlines: Vec<RawHeadline>) -> Self {
            self.feeds.insert(source.to_string(), headlines);
            self
        }
    }

    impl NewsSource for FakeNews {
        async fn fetch_headlines(&self, source_id: &str, page_size: usize) -> Result<Vec<RawHeadline>> {
            self.feeds
                .get(source_id)
                .map(|h| h.iter().take(page_size).cloned().collect())
                .ok_or_else(|| IngestError::NewsApi(format!("sourceDoesNotExist: {source_id}")))
        }
    }

    const PAGE: &str = r#"<html><head><title>Page</title></head><body><article>
        <p>The full story as published on the source site, long enough to pass the
        extraction threshold and be preferred over the API snippet by the assembler.</p>
        </article></body></html>"#;

    const BOT_WALL: &str =
        "<html><body><div><p>Please enable JavaScript to continue reading.</p></div></body></html>";

    struct FakeFetcher;

    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            if url.contains("panic") {
                panic!("parser blew up on {url}");
            }
            if url.contains("botwall") {
                return Ok(BOT_WALL.to_string());
            }
            if url.contains("missing") {
                return Err(IngestError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            }
            Ok(PAGE.to_string())
        }
    }

    struct FakeModel {
        reply: Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeModel {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(IngestError::MissingCredentials("GEMINI_API_KEY")),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl AskAsync for FakeModel {
        async fn ask(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(IngestError::MissingCredentials("GEMINI_API_KEY")),
            }
        }
    }

    /// Memory store that records create order and can refuse one slug.
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        created: Mutex<Vec<String>>,
        refuse: Option<String>,
    }

    impl ArticleStore for RecordingStore {
        async fn exists(&self, slug: &str) -> Result<bool> {
            self.inner.exists(slug).await
        }

        async fn get(&self, slug: &str) -> Result<Option<Article>> {
            self.inner.get(slug).await
        }

        async fn create(&self, article: &Article) -> Result<()> {
            if self.refuse.as_deref() == Some(article.slug.as_str()) {
                return Err(IngestError::Storage("disk full".to_string()));
            }
            self.created.lock().unwrap().push(article.slug.clone());
            self.inner.create(article).await
        }

        async fn update(&self, slug: &str, patch: &Value) -> Result<()> {
            self.inner.update(slug, patch).await
        }

        async fn delete(&self, slug: &str) -> Result<()> {
            self.inner.delete(slug).await
        }
    }

    const AI_REPLY: &str = r#"Sure! Here it is:
```json
{"description": "Rewritten summary.", "location": "Frankfurt", "tag": "business",
 "region": "Europe", "blocks": [{"type": "heading", "heading": "Rates rise"},
 {"type": "text", "text": "Rewritten body."}]}
```"#;

    fn headline(title: &str, url: &str) -> RawHeadline {
        RawHeadline {
            source_id: "wire".to_string(),
            source_name: "Wire".to_string(),
            title: title.to_string(),
            description: Some(format!("About {title}.")),
            content: Some("Snippet… [+120 chars]".to_string()),
            url: Some(url.to_string()),
            published_at: "2025-05-06T14:30:00Z".to_string(),
            ..RawHeadline::default()
        }
    }

    fn settings(slug_policy: SlugPolicy) -> IngestSettings {
        IngestSettings {
            page_size: 10,
            slug_policy,
        }
    }

    fn ingestor<'t>(
        news: FakeNews,
        model: FakeModel,
        store: RecordingStore,
        taxonomy: &'t Taxonomy,
        policy: SlugPolicy,
    ) -> Ingestor<'t, FakeNews, FakeFetcher, FakeModel, RecordingStore> {
        Ingestor::new(
            news,
            Scraper::new(FakeFetcher, 5000),
            model,
            store,
            taxonomy,
            settings(policy),
        )
    }

    #[tokio::test]
    async fn test_run_stores_enhanced_articles_in_order() {
        let taxonomy = Taxonomy::builtin();
        let news = FakeNews::default().with_feed(
            "wire",
            vec![
                headline("Rates rise - Wire", "https://example.com/rates"),
                headline("[Removed]", "https://example.com/removed"),
                headline("Markets rally", "https://example.com/markets"),
            ],
        );
        let ing = ingestor(
            news,
            FakeModel::replying(AI_REPLY),
            RecordingStore::default(),
            &taxonomy,
            SlugPolicy::Overwrite,
        );

        let report = ing.run(&[SourceConfig::new("wire")]).await;
        assert_eq!(report.total_added(), 2);
        assert_eq!(
            report.sources,
            vec![SourceOutcome::Completed {
                source: "wire".to_string(),
                articles_added: 2,
                skipped: 1,
                failures: vec![],
            }]
        );
        assert_eq!(
            *ing.store().created.lock().unwrap(),
            vec!["rates-rise", "markets-rally"]
        );

        let stored = ing.store().get("rates-rise").await.unwrap().unwrap();
        assert_eq!(stored.title, "Rates rise");
        assert_eq!(stored.tag, "Business");
        assert_eq!(stored.location, "Frankfurt");
        assert_eq!(stored.blocks.len(), 1);
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test]
    async fn test_prompt_uses_scraped_content() {
        let taxonomy = Taxonomy::builtin();
        let news =
            FakeNews::default().with_feed("wire", vec![headline("Rates rise", "https://example.com/a")]);
        let ing = ingestor(
            news,
            FakeModel::replying(AI_REPLY),
            RecordingStore::default(),
            &taxonomy,
            SlugPolicy::Overwrite,
        );
        ing.run(&[SourceConfig::new("wire")]).await;
        let prompts = ing.model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("The full story as published on the source site"));
    }

    #[tokio::test]
    async fn test_source_failure_does_not_stop_other_sources() {
        let taxonomy = Taxonomy::builtin();
        let news =
            FakeNews::default().with_feed("wire", vec![headline("Rates rise", "https://example.com/a")]);
        let ing = ingestor(
            news,
            FakeModel::replying(AI_REPLY),
            RecordingStore::default(),
            &taxonomy,
            SlugPolicy::Overwrite,
        );

        let report = ing
            .run(&[SourceConfig::new("gone"), SourceConfig::new("wire")])
            .await;
        assert_eq!(report.failed_sources(), 1);
        assert_eq!(report.sources[0].source(), "gone");
        assert!(matches!(
            &report.sources[0],
            SourceOutcome::Failed { error, .. } if error.contains("sourceDoesNotExist")
        ));
        assert_eq!(report.sources[1].articles_added(), 1);
    }

    #[tokio::test]
    async fn test_item_failures_are_isolated() {
        let taxonomy = Taxonomy::builtin();
        let news = FakeNews::default().with_feed(
            "wire",
            vec![
                headline("Exploding page", "https://example.com/panic"),
                headline("Full disk", "https://example.com/disk"),
                headline("Fine story", "https://example.com/fine"),
            ],
        );
        let store = RecordingStore {
            refuse: Some("full-disk".to_string()),
            ..RecordingStore::default()
        };
        let ing = ingestor(
            news,
            FakeModel::replying(AI_REPLY),
            store,
            &taxonomy,
            SlugPolicy::Overwrite,
        );

        let report = ing.run(&[SourceConfig::new("wire")]).await;
        let SourceOutcome::Completed {
            articles_added,
            failures,
            ..
        } = &report.sources[0]
        else {
            panic!("source should complete");
        };
        assert_eq!(*articles_added, 1);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].title, "Exploding page");
        assert!(failures[0].error.contains("parser blew up"));
        assert_eq!(failures[1].title, "Full disk");
        assert!(failures[1].error.contains("disk full"));
        assert_eq!(*ing.store().created.lock().unwrap(), vec!["fine-story"]);
    }

    #[tokio::test]
    async fn test_degrades_without_scrape_or_model() {
        let taxonomy = Taxonomy::builtin();
        let news = FakeNews::default().with_feed(
            "wire",
            vec![headline("Election results announced", "https://example.com/missing")],
        );
        let ing = ingestor(
            news,
            FakeModel::failing(),
            RecordingStore::default(),
            &taxonomy,
            SlugPolicy::Overwrite,
        );

        let report = ing.run(&[SourceConfig::new("wire")]).await;
        assert_eq!(report.total_added(), 1);
        let stored = ing
            .store()
            .get("election-results-announced")
            .await
            .unwrap()
            .unwrap();
        assert!(taxonomy.canonical_tag(&stored.tag).is_some());
        assert!(taxonomy.canonical_region(&stored.region).is_some());
        assert_eq!(stored.blocks, vec![crate::models::ContentBlock::text("Snippet…")]);
    }

    #[tokio::test]
    async fn test_bot_wall_page_falls_back_to_headline_content() {
        let taxonomy = Taxonomy::builtin();
        let mut item = headline("Rates rise", "https://example.com/botwall");
        let snippet = "The central bank raised its main rate by a quarter point on Tuesday, \
                       the third increase this year, as services inflation stayed stubborn.";
        item.content = Some(snippet.to_string());
        let news = FakeNews::default().with_feed("wire", vec![item]);
        let ing = ingestor(
            news,
            FakeModel::failing(),
            RecordingStore::default(),
            &taxonomy,
            SlugPolicy::Overwrite,
        );

        ing.run(&[SourceConfig::new("wire")]).await;
        let stored = ing.store().get("rates-rise").await.unwrap().unwrap();
        assert_eq!(stored.blocks, vec![crate::models::ContentBlock::text(snippet)]);
        assert!(!stored.description.contains("JavaScript"));
    }

    #[tokio::test]
    async fn test_empty_slug_is_an_item_failure() {
        let taxonomy = Taxonomy::builtin();
        let news = FakeNews::default().with_feed("wire", vec![headline("!!!", "https://example.com/a")]);
        let ing = ingestor(
            news,
            FakeModel::replying(AI_REPLY),
            RecordingStore::default(),
            &taxonomy,
            SlugPolicy::Overwrite,
        );
        let report = ing.run(&[SourceConfig::new("wire")]).await;
        assert_eq!(report.total_added(), 0);
        assert!(ing.store().created.lock().unwrap().is_empty());
    }

    async fn run_duplicates(policy: SlugPolicy) -> (IngestReport, Vec<String>) {
        let taxonomy = Taxonomy::builtin();
        let news = FakeNews::default().with_feed(
            "wire",
            vec![
                headline("Same title", "https://example.com/1"),
                headline("Same title", "https://example.com/2"),
                headline("Same title", "https://example.com/3"),
            ],
        );
        let ing = ingestor(
            news,
            FakeModel::replying(AI_REPLY),
            RecordingStore::default(),
            &taxonomy,
            policy,
        );
        let report = ing.run(&[SourceConfig::new("wire")]).await;
        let slugs = ing.store().inner.slugs().await;
        (report, slugs)
    }

    #[tokio::test]
    async fn test_slug_policy_overwrite() {
        let (report, slugs) = run_duplicates(SlugPolicy::Overwrite).await;
        assert_eq!(report.total_added(), 3);
        assert_eq!(slugs, vec!["same-title"]);
    }

    #[tokio::test]
    async fn test_slug_policy_reject() {
        let (report, slugs) = run_duplicates(SlugPolicy::Reject).await;
        assert_eq!(report.total_added(), 1);
        assert_eq!(slugs, vec!["same-title"]);
        let SourceOutcome::Completed { failures, .. } = &report.sources[0] else {
            panic!("source should complete");
        };
        assert_eq!(failures.len(), 2);
        assert!(failures[0].error.contains("already exists"));
    }

    #[tokio::test]
    async fn test_slug_policy_suffix() {
        let (report, slugs) = run_duplicates(SlugPolicy::Suffix).await;
        assert_eq!(report.total_added(), 3);
        assert_eq!(slugs, vec!["same-title", "same-title-2", "same-title-3"]);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
