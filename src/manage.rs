//! Operator commands against the article store.
//!
//! Ingestion only ever creates drafts. Reviewing and publishing them, or
//! pulling a story, happens through these commands.

use crate::cli::Command;
use crate::error::{IngestError, Result};
use crate::models::{Article, ArticleStatus};
use crate::store::ArticleStore;
use serde_json::json;
use tracing::{info, instrument};

/// Run `command` against `store`.
///
/// # Arguments
///
/// * `store` - The article store to operate on
/// * `command` - The maintenance command parsed from the CLI
///
/// # Returns
///
/// The article as stored after the command, or `None` for `delete`.
/// Commands naming a slug that is not stored fail with a storage error.
#[instrument(level = "info", skip(store))]
pub async fn execute<S: ArticleStore>(store: &S, command: &Command) -> Result<Option<Article>> {
    match command {
        Command::Show { slug } => require(store, slug).await.map(Some),
        Command::Publish { slug } => {
            store
                .update(slug, &json!({ "status": ArticleStatus::Published }))
                .await?;
            info!(%slug, "Published article");
            require(store, slug).await.map(Some)
        }
        Command::Feature { slug, off } => {
            store.update(slug, &json!({ "headline": !off })).await?;
            info!(%slug, headline = !off, "Updated headline flag");
            require(store, slug).await.map(Some)
        }
        Command::Delete { slug } => {
            if !store.exists(slug).await? {
                return Err(not_found(slug));
            }
            store.delete(slug).await?;
            info!(%slug, "Deleted article");
            Ok(None)
        }
    }
}

async fn require<S: ArticleStore>(store: &S, slug: &str) -> Result<Article> {
    store.get(slug).await?.ok_or_else(|| not_found(slug))
}

fn not_found(slug: &str) -> IngestError {
    IngestError::Storage(format!("no article with slug `{slug}`"))
}
