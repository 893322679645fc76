//! Data models for headlines, scraped pages, content blocks and articles.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`RawHeadline`]: An item as returned by the news source API
//! - [`ScrapedContent`]: Main-content text mined from the headline's page
//! - [`ContentBlock`]: One typed unit of article content
//! - [`AiArticle`]: The model's restructuring of a story, read leniently
//! - [`Article`]: The validated, ready-to-persist document
//! - [`IngestReport`]: Per-source outcomes of one ingestion run
//!
//! Persisted and model-facing JSON uses camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

/// A headline as received from the news source API.
///
/// Ephemeral; it is either discarded by the eligibility filter or turned
/// into an [`Article`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHeadline {
    /// The news API's identifier of the source (e.g. `bbc-news`).
    pub source_id: String,
    /// Human readable source name (e.g. `BBC News`).
    pub source_name: String,
    pub title: String,
    pub description: Option<String>,
    /// Possibly truncated body text supplied by the API.
    pub content: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    /// Publication timestamp as supplied, usually RFC 3339.
    pub published_at: String,
    pub url_to_image: Option<String>,
}

/// Main-content text extracted from an article page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedContent {
    /// Page title, at most 200 characters.
    pub title: String,
    /// Cleaned body text, bounded to the scraper's character budget.
    pub content: String,
    /// Same value as `content`; kept separate for callers that want "the text".
    pub text: String,
}

/// One image of a gallery block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GalleryImage {
    #[serde(rename = "imgUrl", default, deserialize_with = "null_as_default")]
    pub img_url: String,
    #[serde(rename = "imgAlt", default, deserialize_with = "null_as_default")]
    pub img_alt: String,
}

/// One typed unit of article content.
///
/// Serialized with an internal `type` tag, e.g.
/// `{"type":"quote","quote":"...","spokesperson":"...","role":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    #[serde(alias = "paragraph")]
    Text { text: String },
    Heading { heading: String },
    Highlight { highlight: String },
    Callout { callout: String },
    Quote {
        quote: String,
        #[serde(default, deserialize_with = "null_as_default")]
        spokesperson: String,
        #[serde(default, deserialize_with = "null_as_default")]
        role: String,
    },
    Image {
        #[serde(rename = "imgUrl")]
        img_url: String,
        #[serde(rename = "imgAlt", default, deserialize_with = "null_as_default")]
        img_alt: String,
    },
    Gallery { images: Vec<GalleryImage> },
    Video {
        #[serde(rename = "videoUrl")]
        video_url: String,
        #[serde(rename = "videoAlt", default, deserialize_with = "null_as_default")]
        video_alt: String,
    },
    List { items: Vec<String> },
    Separator {},
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Trim every string field and drop empty list/gallery entries.
    ///
    /// Returns `None` when nothing meaningful is left (an empty paragraph,
    /// an image without URL, a list without items).
    pub fn normalized(self) -> Option<Self> {
        fn keep(s: String) -> Option<String> {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }

        match self {
            ContentBlock::Text { text } => keep(text).map(|text| ContentBlock::Text { text }),
            ContentBlock::Heading { heading } => {
                keep(heading).map(|heading| ContentBlock::Heading { heading })
            }
            ContentBlock::Highlight { highlight } => {
                keep(highlight).map(|highlight| ContentBlock::Highlight { highlight })
            }
            ContentBlock::Callout { callout } => {
                keep(callout).map(|callout| ContentBlock::Callout { callout })
            }
            ContentBlock::Quote {
                quote,
                spokesperson,
                role,
            } => keep(quote).map(|quote| ContentBlock::Quote {
                quote,
                spokesperson: spokesperson.trim().to_string(),
                role: role.trim().to_string(),
            }),
            ContentBlock::Image { img_url, img_alt } => {
                keep(img_url).map(|img_url| ContentBlock::Image {
                    img_url,
                    img_alt: img_alt.trim().to_string(),
                })
            }
            ContentBlock::Gallery { images } => {
                let images: Vec<GalleryImage> = images
                    .into_iter()
                    .filter_map(|img| {
                        keep(img.img_url).map(|img_url| GalleryImage {
                            img_url,
                            img_alt: img.img_alt.trim().to_string(),
                        })
                    })
                    .collect();
                (!images.is_empty()).then_some(ContentBlock::Gallery { images })
            }
            ContentBlock::Video {
                video_url,
                video_alt,
            } => keep(video_url).map(|video_url| ContentBlock::Video {
                video_url,
                video_alt: video_alt.trim().to_string(),
            }),
            ContentBlock::List { items } => {
                let items: Vec<String> = items.into_iter().filter_map(keep).collect();
                (!items.is_empty()).then_some(ContentBlock::List { items })
            }
            ContentBlock::Separator {} => Some(ContentBlock::Separator {}),
        }
    }
}

/// The model's restructuring of a story.
///
/// Read leniently from whatever object the JSON extractor recovered: missing
/// or mistyped fields become `None`, and block entries that do not match a
/// known variant are skipped one by one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiArticle {
    pub description: Option<String>,
    pub location: Option<String>,
    pub tag: Option<String>,
    pub region: Option<String>,
    pub blocks: Vec<ContentBlock>,
}

impl AiArticle {
    pub fn from_value(value: &Value) -> Self {
        let text_field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let blocks = match value.get("blocks") {
            Some(Value::Array(items)) => items.iter().filter_map(parse_block).collect(),
            Some(other) => {
                debug!(kind = %json_kind(other), "`blocks` is not an array; ignoring");
                Vec::new()
            }
            None => Vec::new(),
        };

        AiArticle {
            description: text_field("description"),
            location: text_field("location"),
            tag: text_field("tag"),
            region: text_field("region"),
            blocks,
        }
    }
}

fn parse_block(raw: &Value) -> Option<ContentBlock> {
    let mut raw = raw.clone();
    // Models are inconsistent about the tag's case ("Text", "HEADING").
    if let Some(Value::String(kind)) = raw.get_mut("type") {
        *kind = kind.trim().to_lowercase();
    }
    match serde_json::from_value::<ContentBlock>(raw) {
        Ok(block) => Some(block),
        Err(e) => {
            debug!(error = %e, "Skipping unrecognised block");
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Editorial state of an article. Ingested articles start as drafts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
}

/// A validated, ready-to-persist article document keyed by `slug`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub description: String,
    /// Publication date, `YYYY-MM-DD` when the source timestamp parses.
    pub date: String,
    pub location: String,
    pub tag: String,
    pub region: String,
    pub cover_img: String,
    pub cover_img_alt: String,
    pub slug: String,
    pub blocks: Vec<ContentBlock>,
    pub views: u64,
    /// Whether the article is featured as a headline on the front page.
    pub headline: bool,
    #[serde(default)]
    pub status: ArticleStatus,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

/// A headline that could not be turned into a persisted article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub title: String,
    pub error: String,
}

/// What happened to one configured source during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceOutcome {
    Completed {
        source: String,
        #[serde(rename = "articlesAdded")]
        articles_added: usize,
        /// Headlines dropped by the eligibility filter.
        skipped: usize,
        failures: Vec<ItemFailure>,
    },
    Failed {
        source: String,
        error: String,
    },
}

impl SourceOutcome {
    pub fn source(&self) -> &str {
        match self {
            SourceOutcome::Completed { source, .. } | SourceOutcome::Failed { source, .. } => source,
        }
    }

    pub fn articles_added(&self) -> usize {
        match self {
            SourceOutcome::Completed { articles_added, .. } => *articles_added,
            SourceOutcome::Failed { .. } => 0,
        }
    }
}

/// The structured result of one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceOutcome>,
}

impl IngestReport {
    pub fn total_added(&self) -> usize {
        self.sources.iter().map(SourceOutcome::articles_added).sum()
    }

    pub fn failed_items(&self) -> usize {
        self.sources
            .iter()
            .map(|o| match o {
                SourceOutcome::Completed { failures, .. } => failures.len(),
                SourceOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn failed_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|o| matches!(o, SourceOutcome::Failed { .. }))
            .count()
    }
}
