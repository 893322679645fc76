//! Persistent article store keyed by slug.
//!
//! The store is schema-less and transaction-less: documents are plain JSON
//! values, `create` overwrites whatever is stored under the slug, and
//! `update` merges top-level fields. All validation happens in
//! [`crate::assemble`] before anything reaches the store; collision policy
//! lives in [`crate::ingest`].
//!
//! Two backends are provided:
//! - [`JsonDirStore`]: one `<slug>.json` file per article under a directory
//! - [`MemoryStore`]: an in-process map, used by tests and dry runs

use crate::error::{IngestError, Result};
use crate::models::Article;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

pub trait ArticleStore {
    async fn exists(&self, slug: &str) -> Result<bool>;

    async fn get(&self, slug: &str) -> Result<Option<Article>>;

    /// Store `article` under its slug, replacing any existing document.
    async fn create(&self, article: &Article) -> Result<()>;

    /// Merge the top-level fields of `patch` into the stored document.
    async fn update(&self, slug: &str, patch: &Value) -> Result<()>;

    /// Remove the document; removing a missing slug is not an error.
    async fn delete(&self, slug: &str) -> Result<()>;
}

fn merge_fields(doc: &mut Value, patch: &Value, slug: &str) -> Result<()> {
    let (Value::Object(doc), Value::Object(patch)) = (doc, patch) else {
        return Err(IngestError::Storage(format!(
            "update of `{slug}` needs an object document and patch"
        )));
    };
    for (key, value) in patch {
        doc.insert(key.clone(), value.clone());
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored slugs in key order.
    pub async fn slugs(&self) -> Vec<String> {
        self.docs.read().await.keys().cloned().collect()
    }
}

impl ArticleStore for MemoryStore {
    async fn exists(&self, slug: &str) -> Result<bool> {
        Ok(self.docs.read().await.contains_key(slug))
    }

    async fn get(&self, slug: &str) -> Result<Option<Article>> {
        match self.docs.read().await.get(slug) {
            Some(doc) => Ok(Some(serde_json::from_value(doc.clone())?)),
            None => Ok(None),
        }
    }

    async fn create(&self, article: &Article) -> Result<()> {
        let doc = serde_json::to_value(article)?;
        self.docs.write().await.insert(article.slug.clone(), doc);
        Ok(())
    }

    async fn update(&self, slug: &str, patch: &Value) -> Result<()> {
        let mut docs = self.docs.write().await;
        let doc = docs
            .get_mut(slug)
            .ok_or_else(|| IngestError::Storage(format!("no article with slug `{slug}`")))?;
        merge_fields(doc, patch, slug)
    }

    async fn delete(&self, slug: &str) -> Result<()> {
        self.docs.write().await.remove(slug);
        Ok(())
    }
}

/// Directory-backed store writing one pretty-printed JSON file per slug.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, slug: &str) -> Result<PathBuf> {
        let valid = !slug.is_empty()
            && slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(IngestError::Storage(format!("invalid slug `{slug}`")));
        }
        Ok(self.dir.join(format!("{slug}.json")))
    }

    async fn read_doc(&self, slug: &str) -> Result<Option<Value>> {
        let path = self.path_for(slug)?;
        match fs::read_to_string(&path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_doc(&self, slug: &str, doc: &Value) -> Result<()> {
        let path = self.path_for(slug)?;
        fs::create_dir_all(&self.dir).await?;
        fs::write(&path, serde_json::to_string_pretty(doc)?).await?;
        debug!(path = %path.display(), "Wrote article document");
        Ok(())
    }
}

impl ArticleStore for JsonDirStore {
    async fn exists(&self, slug: &str) -> Result<bool> {
        Ok(fs::try_exists(self.path_for(slug)?).await?)
    }

    async fn get(&self, slug: &str) -> Result<Option<Article>> {
        match self.read_doc(slug).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    #[instrument(level = "debug", skip_all, fields(slug = %article.slug))]
    async fn create(&self, article: &Article) -> Result<()> {
        self.write_doc(&article.slug, &serde_json::to_value(article)?)
            .await
    }

    #[instrument(level = "debug", skip(self, patch))]
    async fn update(&self, slug: &str, patch: &Value) -> Result<()> {
        let mut doc = self
            .read_doc(slug)
            .await?
            .ok_or_else(|| IngestError::Storage(format!("no article with slug `{slug}`")))?;
        merge_fields(&mut doc, patch, slug)?;
        self.write_doc(slug, &doc).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete(&self, slug: &str) -> Result<()> {
        match fs::remove_file(self.path_for(slug)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleStatus, ContentBlock};
    use serde_json::json;

    fn article(slug: &str) -> Article {
        Article {
            title: "Budget approved".to_string(),
            description: "The budget passed.".to_string(),
            date: "2025-05-06".to_string(),
            location: "London".to_string(),
            tag: "Politics".to_string(),
            region: "Europe".to_string(),
            cover_img: String::new(),
            cover_img_alt: "Budget approved".to_string(),
            slug: slug.to_string(),
            blocks: vec![ContentBlock::text("Body")],
            views: 0,
            headline: false,
            status: ArticleStatus::Draft,
            source: "Example News".to_string(),
            source_url: None,
            author: None,
        }
    }

    async fn exercise(store: &impl ArticleStore) {
        assert!(!store.exists("budget-approved").await.unwrap());
        assert_eq!(store.get("budget-approved").await.unwrap(), None);

        store.create(&article("budget-approved")).await.unwrap();
        assert!(store.exists("budget-approved").await.unwrap());

        store
            .update(
                "budget-approved",
                &json!({"status": "published", "views": 42}),
            )
            .await
            .unwrap();
        let stored = store.get("budget-approved").await.unwrap().unwrap();
        assert_eq!(stored.status, ArticleStatus::Published);
        assert_eq!(stored.views, 42);
        assert_eq!(stored.title, "Budget approved");

        let mut replacement = article("budget-approved");
        replacement.title = "Budget approved again".to_string();
        store.create(&replacement).await.unwrap();
        let stored = store.get("budget-approved").await.unwrap().unwrap();
        assert_eq!(stored.title, "Budget approved again");
        assert_eq!(stored.views, 0);

        assert!(store.update("missing", &json!({"views": 1})).await.is_err());
        assert!(store.update("budget-approved", &json!(["x"])).await.is_err());

        store.delete("budget-approved").await.unwrap();
        assert!(!store.exists("budget-approved").await.unwrap());
        store.delete("budget-approved").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        exercise(&store).await;
        store.create(&article("b")).await.unwrap();
        store.create(&article("a")).await.unwrap();
        assert_eq!(store.slugs().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_json_dir_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path().join("articles"));
        exercise(&store).await;
    }

    #[tokio::test]
    async fn test_json_dir_store_writes_camel_case_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        store.create(&article("budget-approved")).await.unwrap();
        let raw = std::fs::read_to_string(dir.path().join("budget-approved.json")).unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["coverImgAlt"], "Budget approved");
        assert_eq!(doc["blocks"][0]["type"], "text");
    }

    #[tokio::test]
    async fn test_json_dir_store_rejects_path_like_slugs() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        assert!(store.exists("../etc/passwd").await.is_err());
        assert!(store.create(&article("")).await.is_err());
    }
}
