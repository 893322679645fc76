//! The closed, ordered sets of tags and regions articles are filed under.
//!
//! A [`Taxonomy`] is loaded once per run (either the built-in table or a
//! YAML file) and handed by reference to the classifier, the prompt builder
//! and the assembler. The order of `tags` and `regions` is significant: the
//! keyword classifier returns the first category that matches.
//!
//! # YAML format
//!
//! ```yaml
//! tags:
//!   - title: Politics
//!     keywords: [election, parliament]
//! regions:
//!   - title: Europe
//!     keywords: [europe, london]
//! default_tag: Politics
//! default_region: Europe
//! ```

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument};

/// A tag or region together with the keyword phrases that suggest it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(title: &str, keywords: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    tags: Vec<Category>,
    regions: Vec<Category>,
    default_tag: String,
    default_region: String,
}

const BUILTIN_TAGS: &[(&str, &[&str])] = &[
    (
        "Politics",
        &[
            "election", "parliament", "senate", "congress", "minister", "president",
            "government", "legislation", "campaign", "lawmakers", "policy",
        ],
    ),
    (
        "Business",
        &[
            "market", "stocks", "economy", "inflation", "earnings", "investor", "bank",
            "trade", "company", "shares", "interest rate",
        ],
    ),
    (
        "Technology",
        &[
            "technology", "artificial intelligence", "software", "smartphone", "semiconductor",
            "cybersecurity", "startup", "silicon valley", "chatbot", "data breach",
        ],
    ),
    (
        "Science",
        &[
            "scientist", "research", "nasa", "space", "telescope", "physics", "astronom",
            "discovery", "planet",
        ],
    ),
    (
        "Health",
        &[
            "health", "hospital", "vaccine", "disease", "virus", "medical", "cancer", "patients",
            "outbreak",
        ],
    ),
    (
        "Sports",
        &[
            "football", "soccer", "basketball", "tennis", "olympic", "championship", "tournament",
            "league", "coach", "world cup",
        ],
    ),
    (
        "Entertainment",
        &[
            "film", "movie", "music", "celebrity", "actor", "actress", "album", "hollywood",
            "netflix", "box office",
        ],
    ),
    (
        "Environment",
        &[
            "climate", "environment", "emissions", "wildfire", "flood", "pollution", "renewable",
            "drought", "biodiversity",
        ],
    ),
    (
        "World",
        &[
            "war", "conflict", "united nations", "refugee", "diplomat", "ceasefire", "sanctions",
        ],
    ),
];

const BUILTIN_REGIONS: &[(&str, &[&str])] = &[
    (
        "Latin America",
        &[
            "latin america", "brazil", "argentina", "chile", "colombia", "peru", "venezuela",
            "caribbean",
        ],
    ),
    (
        "North America",
        &[
            "united states", "u.s.", "america", "canada", "mexico", "washington", "new york",
            "california", "white house",
        ],
    ),
    (
        "Europe",
        &[
            "europe", "european union", "britain", "united kingdom", "london", "france", "paris",
            "germany", "berlin", "italy", "spain", "ukraine", "russia", "brussels",
        ],
    ),
    (
        "Middle East",
        &[
            "middle east", "israel", "gaza", "iran", "iraq", "syria", "saudi", "lebanon", "yemen",
        ],
    ),
    (
        "Africa",
        &["africa", "nigeria", "kenya", "egypt", "ethiopia", "sudan", "ghana"],
    ),
    (
        "Asia",
        &[
            "asia", "china", "beijing", "japan", "tokyo", "india", "korea", "pakistan",
            "indonesia", "taiwan", "hong kong",
        ],
    ),
    (
        "Oceania",
        &["australia", "new zealand", "sydney", "pacific islands"],
    ),
    ("Global", &["global", "worldwide", "international"]),
];

impl Taxonomy {
    /// Build and validate a taxonomy. Keywords are lowercased so the
    /// classifier can match them against lowercased text.
    pub fn new(
        tags: Vec<Category>,
        regions: Vec<Category>,
        default_tag: impl Into<String>,
        default_region: impl Into<String>,
    ) -> Result<Self> {
        let taxonomy = Self {
            tags: normalized(tags),
            regions: normalized(regions),
            default_tag: default_tag.into(),
            default_region: default_region.into(),
        };
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    /// The taxonomy compiled into the binary.
    pub fn builtin() -> Self {
        let table = |rows: &[(&str, &[&str])]| {
            rows.iter()
                .map(|(title, keywords)| Category::new(title, keywords))
                .collect::<Vec<_>>()
        };
        Self {
            tags: table(BUILTIN_TAGS),
            regions: table(BUILTIN_REGIONS),
            default_tag: "World".to_string(),
            default_region: "Global".to_string(),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let raw: Taxonomy = serde_yaml::from_str(yaml)?;
        Self::new(raw.tags, raw.regions, raw.default_tag, raw.default_region)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = tokio::fs::read_to_string(path.as_ref()).await?;
        let taxonomy = Self::from_yaml_str(&yaml)?;
        info!(
            tags = taxonomy.tags.len(),
            regions = taxonomy.regions.len(),
            "Loaded taxonomy"
        );
        Ok(taxonomy)
    }

    pub fn validate(&self) -> Result<()> {
        check_set("tag", &self.tags, &self.default_tag)?;
        check_set("region", &self.regions, &self.default_region)
    }

    pub fn tags(&self) -> &[Category] {
        &self.tags
    }

    pub fn regions(&self) -> &[Category] {
        &self.regions
    }

    pub fn default_tag(&self) -> &str {
        &self.default_tag
    }

    pub fn default_region(&self) -> &str {
        &self.default_region
    }

    /// The canonical spelling of `name` if it is a tag (case-insensitive).
    pub fn canonical_tag(&self, name: &str) -> Option<&str> {
        canonical(&self.tags, name)
    }

    /// The canonical spelling of `name` if it is a region (case-insensitive).
    pub fn canonical_region(&self, name: &str) -> Option<&str> {
        canonical(&self.regions, name)
    }

    pub fn tag_titles(&self) -> Vec<&str> {
        self.tags.iter().map(|c| c.title.as_str()).collect()
    }

    pub fn region_titles(&self) -> Vec<&str> {
        self.regions.iter().map(|c| c.title.as_str()).collect()
    }
}

fn normalized(categories: Vec<Category>) -> Vec<Category> {
    categories
        .into_iter()
        .map(|c| Category {
            title: c.title.trim().to_string(),
            keywords: c
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        })
        .collect()
}

fn canonical<'a>(categories: &'a [Category], name: &str) -> Option<&'a str> {
    let name = name.trim().to_lowercase();
    categories
        .iter()
        .find(|c| c.title.to_lowercase() == name)
        .map(|c| c.title.as_str())
}

fn check_set(kind: &str, categories: &[Category], default: &str) -> Result<()> {
    if categories.is_empty() {
        return Err(IngestError::InvalidTaxonomy(format!("no {kind}s defined")));
    }
    let mut seen = HashSet::new();
    for category in categories {
        if category.title.is_empty() {
            return Err(IngestError::InvalidTaxonomy(format!("{kind} with empty title")));
        }
        if !seen.insert(category.title.to_lowercase()) {
            return Err(IngestError::InvalidTaxonomy(format!(
                "duplicate {kind} `{}`",
                category.title
            )));
        }
    }
    if canonical(categories, default) != Some(default) {
        return Err(IngestError::InvalidTaxonomy(format!(
            "default {kind} `{default}` is not one of the {kind}s"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_valid() {
        let taxonomy = Taxonomy::builtin();
        taxonomy.validate().unwrap();
        assert!(taxonomy.canonical_tag(taxonomy.default_tag()).is_some());
        assert!(taxonomy.canonical_region(taxonomy.default_region()).is_some());
    }

    #[test]
    fn test_builtin_keywords_are_lowercase() {
        let taxonomy = Taxonomy::builtin();
        for category in taxonomy.tags().iter().chain(taxonomy.regions()) {
            for keyword in &category.keywords {
                assert_eq!(keyword, &keyword.to_lowercase());
            }
        }
    }

    #[test]
    fn test_canonical_lookup_is_case_insensitive() {
        let taxonomy = Taxonomy::builtin();
        assert_eq!(taxonomy.canonical_tag("politics"), Some("Politics"));
        assert_eq!(taxonomy.canonical_tag("  TECHNOLOGY "), Some("Technology"));
        assert_eq!(taxonomy.canonical_tag("Gossip"), None);
        assert_eq!(taxonomy.canonical_region("middle east"), Some("Middle East"));
        assert_eq!(taxonomy.canonical_region("Atlantis"), None);
    }

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
tags:
  - title: Sports
    keywords: [Football, " Tennis "]
  - title: Other
regions:
  - title: Home
    keywords: [here]
default_tag: Other
default_region: Home
"#;
        let taxonomy = Taxonomy::from_yaml_str(yaml).unwrap();
        assert_eq!(taxonomy.tag_titles(), vec!["Sports", "Other"]);
        assert_eq!(taxonomy.tags()[0].keywords, vec!["football", "tennis"]);
        assert!(taxonomy.tags()[1].keywords.is_empty());
        assert_eq!(taxonomy.region_titles(), vec!["Home"]);
    }

    #[test]
    fn test_rejects_default_outside_set() {
        let result = Taxonomy::new(
            vec![Category::new("Sports", &[])],
            vec![Category::new("Home", &[])],
            "Weather",
            "Home",
        );
        assert!(matches!(result, Err(IngestError::InvalidTaxonomy(_))));
    }

    #[test]
    fn test_rejects_duplicates_and_empty_sets() {
        let duplicate = Taxonomy::new(
            vec![Category::new("Sports", &[]), Category::new("sports", &[])],
            vec![Category::new("Home", &[])],
            "Sports",
            "Home",
        );
        assert!(matches!(duplicate, Err(IngestError::InvalidTaxonomy(_))));

        let empty = Taxonomy::new(vec![], vec![Category::new("Home", &[])], "x", "Home");
        assert!(matches!(empty, Err(IngestError::InvalidTaxonomy(_))));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxonomy.yaml");
        std::fs::write(
            &path,
            "tags: [{title: A}]\nregions: [{title: B}]\ndefault_tag: A\ndefault_region: B\n",
        )
        .unwrap();
        let taxonomy = Taxonomy::load(&path).await.unwrap();
        assert_eq!(taxonomy.default_tag(), "A");
        assert_eq!(taxonomy.default_region(), "B");
    }
}
