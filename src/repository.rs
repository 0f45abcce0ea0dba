//! Persistence ports consumed by the ingestion and query paths, plus the
//! in-memory reference adapters. The SQLite adapters live in `db.rs`; core
//! code only ever sees these traits.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Article, NewsGroup, Source, TopicHash};

#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Saves a source. Re-saving the same identity is a no-op; a name
    /// already taken by another source is left untouched (first-seen wins).
    async fn save(&self, source: &Source) -> anyhow::Result<()>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Source>>;
    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Source>>;
    async fn find_all(&self) -> anyhow::Result<Vec<Source>>;
}

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Saves an article. A duplicate link is a no-op, not an error.
    async fn save(&self, article: &Article) -> anyhow::Result<()>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Article>>;
    async fn find_by_link(&self, link: &str) -> anyhow::Result<Option<Article>>;
    /// Most recent first; articles without a publish date sort last.
    async fn find_by_source_id(&self, source_id: Uuid, limit: usize) -> anyhow::Result<Vec<Article>>;
    async fn find_by_group_id(&self, group_id: Uuid) -> anyhow::Result<Vec<Article>>;
}

#[async_trait]
pub trait NewsGroupRepository: Send + Sync {
    /// Saves a group. A duplicate topic hash is a no-op, not an error.
    async fn save(&self, group: &NewsGroup) -> anyhow::Result<()>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<NewsGroup>>;
    async fn find_by_topic_hash(&self, topic_hash: &TopicHash) -> anyhow::Result<Option<NewsGroup>>;
    async fn find_all(&self) -> anyhow::Result<Vec<NewsGroup>>;
}

// ── In-memory adapters ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemorySourceRepository {
    rows: RwLock<Vec<Source>>,
}

impl MemorySourceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SourceRepository for MemorySourceRepository {
    async fn save(&self, source: &Source) -> anyhow::Result<()> {
        let mut rows = self.rows.write().await;
        let taken = rows
            .iter()
            .any(|s| s.id() == source.id() || s.name() == source.name());
        if !taken {
            rows.push(source.clone());
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Source>> {
        Ok(self.rows.read().await.iter().find(|s| s.id() == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Source>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|s| s.name() == name)
            .cloned())
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Source>> {
        Ok(self.rows.read().await.clone())
    }
}

#[derive(Default)]
pub struct MemoryArticleRepository {
    rows: RwLock<Vec<Article>>,
}

impl MemoryArticleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleRepository for MemoryArticleRepository {
    async fn save(&self, article: &Article) -> anyhow::Result<()> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|a| a.link() == article.link()) {
            return Ok(());
        }
        rows.push(article.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Article>> {
        Ok(self.rows.read().await.iter().find(|a| a.id() == id).cloned())
    }

    async fn find_by_link(&self, link: &str) -> anyhow::Result<Option<Article>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|a| a.link() == link)
            .cloned())
    }

    async fn find_by_source_id(&self, source_id: Uuid, limit: usize) -> anyhow::Result<Vec<Article>> {
        let rows = self.rows.read().await;
        let mut matched: Vec<Article> = rows
            .iter()
            .filter(|a| a.source_id() == source_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal keys.
        matched.sort_by(|a, b| match (b.published_at(), a.published_at()) {
            (Some(b_at), Some(a_at)) => b_at.cmp(&a_at),
            (Some(_), None) => std::cmp::Ordering::Greater,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (None, None) => std::cmp::Ordering::Equal,
        });
        matched.truncate(limit);
        Ok(matched)
    }

    async fn find_by_group_id(&self, group_id: Uuid) -> anyhow::Result<Vec<Article>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|a| a.group_id() == Some(group_id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryNewsGroupRepository {
    rows: RwLock<Vec<NewsGroup>>,
}

impl MemoryNewsGroupRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NewsGroupRepository for MemoryNewsGroupRepository {
    async fn save(&self, group: &NewsGroup) -> anyhow::Result<()> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|g| g.topic_hash() == group.topic_hash()) {
            return Ok(());
        }
        rows.push(group.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<NewsGroup>> {
        Ok(self.rows.read().await.iter().find(|g| g.id() == id).cloned())
    }

    async fn find_by_topic_hash(&self, topic_hash: &TopicHash) -> anyhow::Result<Option<NewsGroup>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|g| g.topic_hash() == topic_hash)
            .cloned())
    }

    async fn find_all(&self) -> anyhow::Result<Vec<NewsGroup>> {
        Ok(self.rows.read().await.clone())
    }
}
