use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use uuid::Uuid;

use crate::domain::{Article, Bias, NewsGroup, Source, TopicHash};
use crate::repository::{ArticleRepository, NewsGroupRepository, SourceRepository};

/// SQLite-backed persistence. Implements the three repository ports, so an
/// `Arc<Database>` can be handed out wherever a port is expected.
pub struct Database {
    pool: SqlitePool,
}

#[derive(Debug, Clone, FromRow)]
struct SourceRow {
    id: String,
    name: String,
    url: Option<String>,
    bias: String,
}

#[derive(Debug, Clone, FromRow)]
struct ArticleRow {
    id: String,
    source_id: String,
    group_id: Option<String>,
    title: String,
    link: String,
    description: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct NewsGroupRow {
    id: String,
    topic_hash: String,
    summary: Option<String>,
    created_at: String,
    embedding: Option<String>,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                url TEXT,
                bias TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news_groups (
                id TEXT PRIMARY KEY,
                topic_hash TEXT NOT NULL UNIQUE,
                summary TEXT,
                created_at TEXT NOT NULL,
                embedding TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL REFERENCES sources(id),
                group_id TEXT REFERENCES news_groups(id),
                title TEXT NOT NULL,
                link TEXT NOT NULL UNIQUE,
                description TEXT,
                published_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_articles_source_published
            ON articles(source_id, published_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn source_from_row(row: SourceRow) -> anyhow::Result<Source> {
    let source = Source::build(
        Uuid::parse_str(&row.id)?,
        row.name,
        row.url,
        Bias::parse(&row.bias)?,
    )?;
    Ok(source)
}

fn article_from_row(row: ArticleRow) -> anyhow::Result<Article> {
    // A stored timestamp that no longer parses maps to absent, same as a
    // malformed feed date at ingest time.
    let published_at = row
        .published_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let article = Article::build(
        Uuid::parse_str(&row.id)?,
        row.title,
        row.link,
        Uuid::parse_str(&row.source_id)?,
        row.description,
        published_at,
        row.group_id.as_deref().map(Uuid::parse_str).transpose()?,
    )?;
    Ok(article)
}

fn group_from_row(row: NewsGroupRow) -> anyhow::Result<NewsGroup> {
    let created_at = DateTime::parse_from_rfc3339(&row.created_at)?.with_timezone(&Utc);
    let embedding: Option<Vec<f32>> = row
        .embedding
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;

    let group = NewsGroup::build(
        Uuid::parse_str(&row.id)?,
        TopicHash::new(row.topic_hash)?,
        row.summary,
        created_at,
        embedding,
    )?;
    Ok(group)
}

#[async_trait]
impl SourceRepository for Database {
    async fn save(&self, source: &Source) -> anyhow::Result<()> {
        // OR IGNORE covers both the re-save of an identity and the race on
        // a name: the first successful insert wins, the loser no-ops.
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO sources (id, name, url, bias)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(source.id().to_string())
        .bind(source.name())
        .bind(source.url())
        .bind(source.bias().as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(source_from_row).transpose()
    }

    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(source_from_row).transpose()
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(source_from_row).collect()
    }
}

#[async_trait]
impl ArticleRepository for Database {
    async fn save(&self, article: &Article) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO articles
                (id, source_id, group_id, title, link, description, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(article.id().to_string())
        .bind(article.source_id().to_string())
        .bind(article.group_id().map(|id| id.to_string()))
        .bind(article.title())
        .bind(article.link())
        .bind(article.description())
        .bind(article.published_at().map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(article_from_row).transpose()
    }

    async fn find_by_link(&self, link: &str) -> anyhow::Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE link = ?")
            .bind(link)
            .fetch_optional(&self.pool)
            .await?;
        row.map(article_from_row).transpose()
    }

    async fn find_by_source_id(&self, source_id: Uuid, limit: usize) -> anyhow::Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT * FROM articles
            WHERE source_id = ?
            ORDER BY published_at DESC NULLS LAST, id
            LIMIT ?
            "#,
        )
        .bind(source_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(article_from_row).collect()
    }

    async fn find_by_group_id(&self, group_id: Uuid) -> anyhow::Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            "SELECT * FROM articles WHERE group_id = ? ORDER BY published_at DESC NULLS LAST, id",
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(article_from_row).collect()
    }
}

#[async_trait]
impl NewsGroupRepository for Database {
    async fn save(&self, group: &NewsGroup) -> anyhow::Result<()> {
        let embedding = group
            .embedding()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO news_groups (id, topic_hash, summary, created_at, embedding)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(group.id().to_string())
        .bind(group.topic_hash().as_str())
        .bind(group.summary())
        .bind(group.created_at().to_rfc3339())
        .bind(embedding)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<NewsGroup>> {
        let row = sqlx::query_as::<_, NewsGroupRow>("SELECT * FROM news_groups WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(group_from_row).transpose()
    }

    async fn find_by_topic_hash(&self, topic_hash: &TopicHash) -> anyhow::Result<Option<NewsGroup>> {
        let row =
            sqlx::query_as::<_, NewsGroupRow>("SELECT * FROM news_groups WHERE topic_hash = ?")
                .bind(topic_hash.as_str())
                .fetch_optional(&self.pool)
                .await?;
        row.map(group_from_row).transpose()
    }

    async fn find_all(&self) -> anyhow::Result<Vec<NewsGroup>> {
        let rows =
            sqlx::query_as::<_, NewsGroupRow>("SELECT * FROM news_groups ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(group_from_row).collect()
    }
}
