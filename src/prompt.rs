//! Instruction text sent to the generative model.
//!
//! The prompt is the only contract with the model; nothing enforces the
//! reply's shape, so [`crate::json_repair`] and [`crate::assemble`] treat
//! whatever comes back as untrusted.

use crate::taxonomy::Taxonomy;
use crate::utils::truncate_chars;

/// Raw content beyond this many characters is not sent to the model.
pub const MAX_PROMPT_CONTENT_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub source_name: &'a str,
    /// Region suggested by the keyword classifier.
    pub region: &'a str,
}

const RESPONSE_SHAPE: &str = r#"{
  "description": "One or two sentence summary of the story",
  "location": "City or country where the story takes place",
  "tag": "One of the allowed tags",
  "region": "One of the allowed regions",
  "blocks": [
    {"type": "text", "text": "A paragraph of the rewritten story"},
    {"type": "heading", "heading": "A section heading"},
    {"type": "highlight", "highlight": "A key fact worth emphasising"},
    {"type": "callout", "callout": "Context or background the reader needs"},
    {"type": "quote", "quote": "Exact words", "spokesperson": "Who said them", "role": "Their position"},
    {"type": "list", "items": ["First point", "Second point"]},
    {"type": "separator"}
  ]
}"#;

const RULES: &str = "Rules:
- Output only the JSON object. No markdown, no ``` code fences, no explanation before or after it.
- Do NOT repeat the article title as a heading block; the title is displayed separately.
- \"tag\" must be one of the allowed tags and \"region\" one of the allowed regions, spelled exactly as listed.
- Use only the block types shown above. Escape any double quote inside a string value as \\\".
- Keep every fact from the original content; do not invent quotes or figures.";

/// Build the deterministic instruction text for one story.
///
/// # Arguments
///
/// * `input` - Title, best available content, source name and region hint
/// * `taxonomy` - Supplies the allowed tag and region titles
///
/// # Returns
///
/// The full prompt. Identical inputs always give an identical prompt, and
/// content beyond [`MAX_PROMPT_CONTENT_CHARS`] characters is left out.
pub fn build_prompt(input: &PromptInput<'_>, taxonomy: &Taxonomy) -> String {
    let content = truncate_chars(input.content, MAX_PROMPT_CONTENT_CHARS);

    let mut prompt = String::from(
        "You are a news editor. Rewrite the article below in your own words and split it \
         into typed content blocks.\n\n",
    );
    prompt.push_str(&format!("TITLE: {}\n", input.title.trim()));
    prompt.push_str(&format!("SOURCE: {}\n", input.source_name.trim()));
    prompt.push_str(&format!("REGION HINT: {}\n", input.region.trim()));
    prompt.push_str(&format!("CONTENT:\n{}\n\n", content.trim()));
    prompt.push_str(&format!("ALLOWED TAGS: {}\n", taxonomy.tag_titles().join(", ")));
    prompt.push_str(&format!(
        "ALLOWED REGIONS: {}\n\n",
        taxonomy.region_titles().join(", ")
    ));
    prompt.push_str("Reply with a single JSON object of exactly this shape:\n");
    prompt.push_str(RESPONSE_SHAPE);
    prompt.push_str("\n\n");
    prompt.push_str(RULES);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(content: &'a str) -> PromptInput<'a> {
        PromptInput {
            title: "Central bank raises rates",
            content,
            source_name: "Example News",
            region: "Europe",
        }
    }

    #[test]
    fn test_prompt_embeds_inputs_and_taxonomy() {
        let taxonomy = Taxonomy::builtin();
        let prompt = build_prompt(&input("Rates went up."), &taxonomy);
        assert!(prompt.contains("TITLE: Central bank raises rates"));
        assert!(prompt.contains("SOURCE: Example News"));
        assert!(prompt.contains("REGION HINT: Europe"));
        assert!(prompt.contains("Rates went up."));
        assert!(prompt.contains("ALLOWED TAGS: Politics, Business, Technology"));
        assert!(prompt.contains("Global"));
    }

    #[test]
    fn test_prompt_forbids_fences_and_title_heading() {
        let prompt = build_prompt(&input("x"), &Taxonomy::builtin());
        assert!(prompt.contains("no ``` code fences"));
        assert!(prompt.contains("Do NOT repeat the article title as a heading block"));
        assert!(prompt.contains(r#""type": "quote""#));
    }

    #[test]
    fn test_prompt_content_is_bounded() {
        let content = format!("{}{}", "a".repeat(MAX_PROMPT_CONTENT_CHARS), "OVERFLOW");
        let prompt = build_prompt(&input(&content), &Taxonomy::builtin());
        assert!(prompt.contains(&"a".repeat(MAX_PROMPT_CONTENT_CHARS)));
        assert!(!prompt.contains("OVERFLOW"));
    }

    #[test]
    fn test_prompt_rules_escape_instruction() {
        let prompt = build_prompt(&input("x"), &Taxonomy::builtin());
        assert!(prompt.contains(r#"Escape any double quote inside a string value as \"."#));
        assert!(prompt.contains(r#""tag" must be one of the allowed tags"#));
        assert!(prompt.ends_with("do not invent quotes or figures."));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let taxonomy = Taxonomy::builtin();
        assert_eq!(
            build_prompt(&input("same"), &taxonomy),
            build_prompt(&input("same"), &taxonomy)
        );
    }
}
