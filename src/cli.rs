//! Command-line interface definitions for Awful Ingest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Credentials can be provided via command-line flags or environment variables.

use crate::ingest::SlugPolicy;
use clap::{Parser, Subcommand};

/// Command-line arguments for the Awful Ingest application.
///
/// Flags override the matching values from the YAML configuration file.
///
/// # Examples
///
/// ```sh
/// # Ingest the configured sources into ./articles
/// awful_ingest -c config.yaml -r ./reports
///
/// # One-off run against two sources, never overwriting existing slugs
/// awful_ingest --sources bbc-news,reuters --slug-policy suffix -r ./reports
///
/// # Publish a reviewed draft
/// awful_ingest -s ./articles publish rates-rise
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Optional path to a taxonomy YAML file (built-in taxonomy otherwise)
    #[arg(short, long)]
    pub taxonomy: Option<String>,

    /// Directory of the article store (one JSON document per slug)
    #[arg(short, long)]
    pub store_dir: Option<String>,

    /// Output directory for the JSON run report
    #[arg(short, long, default_value = "./reports")]
    pub report_dir: String,

    /// Comma separated news API source ids, replacing the configured list
    #[arg(long, value_delimiter = ',')]
    pub sources: Option<Vec<String>>,

    /// Number of headlines requested per source
    #[arg(long)]
    pub page_size: Option<usize>,

    /// What to do when an article's slug is already stored
    #[arg(long, value_enum)]
    pub slug_policy: Option<SlugPolicy>,

    /// Run the whole pipeline but keep articles in memory instead of the store
    #[arg(long)]
    pub dry_run: bool,

    /// News API key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Operate on the article store instead of running an ingestion
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Maintenance commands against already stored articles.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print a stored article as JSON
    Show { slug: String },
    /// Mark a stored draft as published
    Publish { slug: String },
    /// Feature a stored article as a front-page headline
    Feature {
        slug: String,
        /// Remove the headline flag instead of setting it
        #[arg(long)]
        off: bool,
    },
    /// Remove a stored article
    Delete { slug: String },
}
