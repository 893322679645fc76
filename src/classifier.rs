//! Keyword-table classification of free text into a tag and a region.
//!
//! Pure and deterministic: the text is lowercased and each category's
//! keyword phrases are tested as substrings, in taxonomy order. The first
//! category with any hit wins, so when a story mentions both "election" and
//! "stocks" the tag that comes first in the taxonomy is always chosen.
//!
//! The result is used to correct or replace the model's classification,
//! never the other way around.

use crate::taxonomy::{Category, Taxonomy};

#[derive(Debug, Clone, Copy)]
pub struct KeywordClassifier<'a> {
    taxonomy: &'a Taxonomy,
}

impl<'a> KeywordClassifier<'a> {
    pub fn new(taxonomy: &'a Taxonomy) -> Self {
        Self { taxonomy }
    }

    /// First tag (in taxonomy order) with a keyword occurring in `text`.
    pub fn classify_tag(&self, text: &str) -> Option<&'a str> {
        first_match(self.taxonomy.tags(), text)
    }

    /// First region (in taxonomy order) with a keyword occurring in `text`.
    pub fn classify_region(&self, text: &str) -> Option<&'a str> {
        first_match(self.taxonomy.regions(), text)
    }
}

fn first_match<'a>(categories: &'a [Category], text: &str) -> Option<&'a str> {
    let haystack = text.to_lowercase();
    categories
        .iter()
        .find(|category| {
            category
                .keywords
                .iter()
                .any(|keyword| haystack.contains(keyword.as_str()))
        })
        .map(|category| category.title.as_str())
}
