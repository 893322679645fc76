//! # Awful Ingest
//!
//! An AI-assisted news ingestion pipeline. Headlines are pulled from a news
//! API, the full text of each story is scraped from its source site, a
//! generative model rewrites it into typed content blocks, and the result is
//! validated against a fixed taxonomy and stored as an article document.
//!
//! ## Usage
//!
//! ```sh
//! NEWS_API_KEY=... GEMINI_API_KEY=... awful_ingest -c config.yaml -r ./reports
//! awful_ingest -c config.yaml publish rates-rise
//! ```
//!
//! ## Architecture
//!
//! For each configured source, one after another:
//! 1. **Fetching**: Ask the news API for the source's top headlines
//! 2. **Filtering**: Drop takedown placeholders and items without a description
//! 3. **Processing**: Scrape, prompt the model, repair its JSON and assemble
//! 4. **Persisting**: Store the article by slug under the configured policy
//!
//! A JSON report of per-source and per-item outcomes is written at the end.
//! Only fatal misconfiguration makes the process exit with an error.

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod assemble;
mod classifier;
mod cli;
mod config;
mod error;
mod ingest;
mod json_repair;
mod manage;
mod models;
mod news;
mod outputs;
mod prompt;
mod scrapers;
mod store;
mod taxonomy;
mod utils;

use api::{GeminiClient, RetryAsk};
use cli::Cli;
use config::Config;
use ingest::{IngestSettings, Ingestor};
use news::NewsApiClient;
use outputs::json;
use scrapers::{HttpFetcher, Scraper};
use store::{JsonDirStore, MemoryStore};
use taxonomy::Taxonomy;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("awful_ingest starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.taxonomy, %args.report_dir, "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = match &args.config {
        Some(path) => Config::load(path).await.inspect_err(|e| {
            error!(path = %path, error = %e, "Failed to load configuration");
        })?,
        None => {
            info!("No config file given; using defaults");
            Config::default()
        }
    };
    config.apply_cli(&args);

    // ---- Store maintenance ----
    if let Some(command) = &args.command {
        let store = JsonDirStore::new(&config.store.dir);
        let article = manage::execute(&store, command).await.inspect_err(|e| {
            error!(store_dir = %config.store.dir, error = %e, "Store command failed");
        })?;
        if let Some(article) = article {
            println!("{}", serde_json::to_string_pretty(&article)?);
        }
        return Ok(());
    }

    let taxonomy = match &config.taxonomy {
        Some(path) => Taxonomy::load(path).await.inspect_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to load taxonomy");
        })?,
        None => Taxonomy::builtin(),
    };
    info!(
        tags = taxonomy.tags().len(),
        regions = taxonomy.regions().len(),
        "Taxonomy ready"
    );

    // Early check: output locations must be writable before any API spend.
    let mut dirs = vec![&args.report_dir];
    if !args.dry_run {
        dirs.push(&config.store.dir);
    }
    for dir in dirs {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir,
                error = %e,
                "Directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    if config.sources.is_empty() {
        warn!("No sources configured; pass --sources or list them in the config file");
    }
    if config.news_api.api_key.is_none() {
        warn!("NEWS_API_KEY is not set; every source will fail");
    }
    if config.model.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; articles will be stored without AI enhancement");
    }

    // ---- Pipeline wiring ----
    let news = NewsApiClient::new(&config.news_api)?;
    let scraper = Scraper::new(
        HttpFetcher::new(&config.scraper)?,
        config.scraper.max_content_chars,
    );
    let model = RetryAsk::new(
        GeminiClient::new(&config.model)?,
        config.model.max_retries,
        Duration::from_millis(config.model.base_delay_ms),
    );
    let settings = IngestSettings {
        page_size: config.news_api.page_size,
        slug_policy: config.slug_policy,
    };
    info!(
        sources = config.sources.len(),
        page_size = settings.page_size,
        slug_policy = ?settings.slug_policy,
        store_dir = %config.store.dir,
        dry_run = args.dry_run,
        "Starting ingestion"
    );

    let report = if args.dry_run {
        let ingestor = Ingestor::new(news, scraper, model, MemoryStore::new(), &taxonomy, settings);
        let report = ingestor.run(&config.sources).await;
        info!(slugs = ?ingestor.store().slugs().await, "Dry run; nothing was persisted");
        report
    } else {
        let store = JsonDirStore::new(&config.store.dir);
        Ingestor::new(news, scraper, model, store, &taxonomy, settings)
            .run(&config.sources)
            .await
    };

    for outcome in &report.sources {
        info!(
            source = %outcome.source(),
            articles_added = outcome.articles_added(),
            "Source summary"
        );
    }

    // ---- Report ----
    if let Err(e) = json::write_report(&report, &args.report_dir).await {
        error!(report_dir = %args.report_dir, error = %e, "Failed to write ingest report");
    }

    let elapsed = start_time.elapsed();
    info!(
        articles_added = report.total_added(),
        failed_items = report.failed_items(),
        failed_sources = report.failed_sources(),
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
