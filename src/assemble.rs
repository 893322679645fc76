//! Composition of headline, scrape and model output into an [`Article`].
//!
//! [`assemble`] always returns a structurally valid article, whatever
//! degraded upstream:
//!
//! - `tag` and `region` are always members of the taxonomy. The model's
//!   value is used only if it names a member; otherwise the keyword
//!   classifier decides, and the taxonomy default applies if nothing matches.
//! - `blocks` is never empty. Degenerate blocks and headings that repeat the
//!   title are dropped, and a single text block of the best available content
//!   stands in when nothing usable is left.
//!
//! Slug collisions are not this module's concern; see [`crate::ingest`].

use crate::classifier::KeywordClassifier;
use crate::models::{AiArticle, Article, ArticleStatus, ContentBlock, RawHeadline, ScrapedContent};
use crate::taxonomy::Taxonomy;
use crate::utils::{clean_text, slugify, truncate_chars};
use chrono::DateTime;
use itertools::Itertools;
use serde_json::Value;
use tracing::debug;

/// Length of the description derived from content when the model gave none.
pub const DESCRIPTION_FALLBACK_CHARS: usize = 200;

/// Build the article for `headline` from whatever upstream stages produced.
///
/// # Arguments
///
/// * `headline` - The eligible headline from the news API
/// * `scraped` - Page content, if the scrape succeeded
/// * `ai` - The JSON object recovered from the model's reply, if any
/// * `taxonomy` - The closed sets `tag` and `region` must come from
///
/// # Returns
///
/// An [`Article`] whose `tag` and `region` are taxonomy members and whose
/// `blocks` is non-empty, however many of the inputs are missing. The slug is
/// derived from the cleaned title and may be empty for titles without
/// alphanumerics; callers decide what to do with that and with collisions.
pub fn assemble(
    headline: &RawHeadline,
    scraped: Option<&ScrapedContent>,
    ai: Option<&Value>,
    taxonomy: &Taxonomy,
) -> Article {
    let title = clean_title(&headline.title, &headline.source_name);
    let content = best_content(headline, scraped);
    let ai = ai.map(AiArticle::from_value).unwrap_or_default();

    let classifier = KeywordClassifier::new(taxonomy);
    let classified_text = format!(
        "{} {} {}",
        title,
        headline.description.as_deref().unwrap_or_default(),
        content
    );

    let tag = ai
        .tag
        .as_deref()
        .and_then(|t| taxonomy.canonical_tag(t))
        .or_else(|| classifier.classify_tag(&classified_text))
        .unwrap_or(taxonomy.default_tag())
        .to_string();
    let region = ai
        .region
        .as_deref()
        .and_then(|r| taxonomy.canonical_region(r))
        .or_else(|| classifier.classify_region(&classified_text))
        .unwrap_or(taxonomy.default_region())
        .to_string();

    if ai.tag.is_some() && ai.tag.as_deref() != Some(tag.as_str()) {
        debug!(model_tag = ?ai.tag, %tag, "Replaced model tag");
    }

    let description = ai
        .description
        .unwrap_or_else(|| truncate_chars(&content, DESCRIPTION_FALLBACK_CHARS).trim().to_string());

    let mut blocks = usable_blocks(ai.blocks, &[title.as_str(), headline.title.as_str()]);
    if blocks.is_empty() {
        debug!("No usable blocks; substituting content as a single text block");
        blocks.push(ContentBlock::text(content.clone()));
    }

    Article {
        slug: slugify(&title),
        description,
        date: publication_date(&headline.published_at),
        location: ai.location.unwrap_or_else(|| region.clone()),
        tag,
        region,
        cover_img: headline.url_to_image.clone().unwrap_or_default(),
        cover_img_alt: title.clone(),
        title,
        blocks,
        views: 0,
        headline: false,
        status: ArticleStatus::Draft,
        source: headline.source_name.clone(),
        source_url: headline.url.clone(),
        author: headline
            .author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string),
    }
}

/// The richest text available for a headline: scraped page text, then the
/// API's content snippet, then its description, then the title.
pub fn best_content(headline: &RawHeadline, scraped: Option<&ScrapedContent>) -> String {
    scraped
        .map(|s| s.content.trim().to_string())
        .into_iter()
        .chain(headline.content.as_deref().map(clean_text))
        .chain(headline.description.as_deref().map(clean_text))
        .find(|c| !c.is_empty())
        .unwrap_or_else(|| headline.title.trim().to_string())
}

/// Drop the " - Source Name" suffix news APIs append to titles.
pub fn clean_title(title: &str, source_name: &str) -> String {
    let title = title.trim();
    let source_name = source_name.trim();
    if source_name.is_empty() {
        return title.to_string();
    }
    title
        .strip_suffix(source_name)
        .and_then(|rest| rest.trim_end().strip_suffix('-'))
        .map(str::trim_end)
        .filter(|rest| !rest.is_empty())
        .unwrap_or(title)
        .to_string()
}

fn usable_blocks(blocks: Vec<ContentBlock>, titles: &[&str]) -> Vec<ContentBlock> {
    let titles: Vec<String> = titles.iter().map(|t| t.trim().to_lowercase()).collect();
    blocks
        .into_iter()
        .filter_map(ContentBlock::normalized)
        .filter(|block| match block {
            ContentBlock::Heading { heading } => !titles.contains(&heading.to_lowercase()),
            _ => true,
        })
        .unique()
        .collect()
}

fn publication_date(published_at: &str) -> String {
    match DateTime::parse_from_rfc3339(published_at.trim()) {
        Ok(dt) => dt.format("%Y-%m-%d").to_string(),
        Err(_) => published_at.trim().to_string(),
    }
}
