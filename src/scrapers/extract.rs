//! Main-content extraction from raw article HTML.
//!
//! The extractor tries a prioritized list of structural selectors (semantic
//! article containers, then well-known content class names, then generic
//! containers) and accepts the first match with more than
//! [`MIN_SELECTOR_CHARS`] characters of text. Pages where every match is
//! decorative fall back to concatenating the `<p>` elements longer than
//! [`MIN_PARAGRAPH_CHARS`] characters. The joined paragraphs are held to the
//! same [`MIN_SELECTOR_CHARS`] floor, so interstitials and bot walls come
//! back as `None` and the headline's own content is used instead.

use crate::models::ScrapedContent;
use crate::utils::{clean_text, truncate_chars};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// A selector match must carry more text than this to be accepted.
pub const MIN_SELECTOR_CHARS: usize = 100;
/// Paragraphs this short or shorter are treated as navigation or chrome.
pub const MIN_PARAGRAPH_CHARS: usize = 20;
pub const MAX_TITLE_CHARS: usize = 200;

const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "[itemprop=\"articleBody\"]",
    "[role=\"article\"]",
    ".article-body",
    ".article-content",
    ".article__content",
    ".story-body",
    ".post-content",
    ".entry-content",
    ".content-body",
    "main",
    "[role=\"main\"]",
    "#content",
    ".content",
];

/// Elements whose text is never article prose.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that start a new run of text; a space is inserted before them.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "section",
    "blockquote", "figcaption", "figure", "tr", "td", "header", "footer", "aside",
];

static SELECTORS: Lazy<Vec<(&'static str, Selector)>> = Lazy::new(|| {
    CONTENT_SELECTORS
        .iter()
        .map(|s| (*s, Selector::parse(s).expect("content selector is valid")))
        .collect()
});
static OG_TITLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[property=\"og:title\"]").expect("og:title selector is valid")
});
static TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("title selector is valid"));
static PARAGRAPH: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("paragraph selector is valid"));

/// Extract title and main text from `html`, bounding the text to `max_chars`.
///
/// # Arguments
///
/// * `html` - A full HTML document
/// * `max_chars` - Character budget for the extracted text
///
/// # Returns
///
/// `None` when neither a content selector nor the paragraph fallback yields
/// more than [`MIN_SELECTOR_CHARS`] characters.
pub fn extract_content(html: &str, max_chars: usize) -> Option<ScrapedContent> {
    let document = Html::parse_document(html);
    let title = extract_title(&document);

    let body = selector_text(&document).or_else(|| paragraph_text(&document))?;
    let content = truncate_chars(&body, max_chars).to_string();
    if content.is_empty() {
        return None;
    }

    Some(ScrapedContent {
        title,
        text: content.clone(),
        content,
    })
}

fn extract_title(document: &Html) -> String {
    let og_title = document
        .select(&OG_TITLE)
        .filter_map(|meta| meta.value().attr("content"))
        .map(clean_text)
        .find(|t| !t.is_empty());

    let title = og_title.unwrap_or_else(|| {
        document
            .select(&TITLE)
            .next()
            .map(|t| clean_text(&t.text().collect::<String>()))
            .unwrap_or_default()
    });

    truncate_chars(&title, MAX_TITLE_CHARS).to_string()
}

fn selector_text(document: &Html) -> Option<String> {
    for (name, selector) in SELECTORS.iter() {
        for element in document.select(selector) {
            let text = clean_text(&element_text(element));
            let chars = text.chars().count();
            if chars > MIN_SELECTOR_CHARS {
                debug!(selector = %name, chars, "Content selector matched");
                return Some(text);
            }
            debug!(selector = %name, chars, "Selector match too short; trying next");
        }
    }
    None
}

fn paragraph_text(document: &Html) -> Option<String> {
    let paragraphs: Vec<String> = document
        .select(&PARAGRAPH)
        .map(|p| clean_text(&element_text(p)))
        .filter(|p| p.chars().count() > MIN_PARAGRAPH_CHARS)
        .collect();

    let joined = paragraphs.join(" ");
    let chars = joined.chars().count();
    debug!(count = paragraphs.len(), chars, "Falling back to paragraph concatenation");
    (chars > MIN_SELECTOR_CHARS).then_some(joined)
}

/// Visible text of `element`, ignoring script-like children.
fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        if let Some(el) = node.value().as_element() {
            if BLOCK_ELEMENTS.contains(&el.name()) {
                out.push(' ');
            }
            continue;
        }
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            out.push_str(text);
        }
    }
    out
}
