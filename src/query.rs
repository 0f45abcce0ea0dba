use std::sync::Arc;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::domain::Bias;
use crate::repository::{ArticleRepository, SourceRepository};

/// One row of the aggregated feed.
#[derive(Debug, Clone, Serialize)]
pub struct NewsItem {
    pub id: Uuid,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    /// ISO 8601, or null when the feed carried no usable date.
    pub published: Option<String>,
    pub source: String,
    pub bias: Bias,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsFeed {
    pub news: Vec<NewsItem>,
    /// Set when one or more sources could not be aggregated; the rows that
    /// were collected are still returned.
    pub partial: bool,
}

/// Aggregates recent articles across all sources: each source contributes
/// up to `limit` articles, in the order the per-source lookup returns them.
/// There is no global re-sort across sources.
pub struct NewsQuery {
    sources: Arc<dyn SourceRepository>,
    articles: Arc<dyn ArticleRepository>,
}

impl NewsQuery {
    pub fn new(sources: Arc<dyn SourceRepository>, articles: Arc<dyn ArticleRepository>) -> Self {
        Self { sources, articles }
    }

    /// Never surfaces internal errors: a failing lookup degrades to a
    /// partial (possibly empty) result with the `partial` flag set.
    pub async fn get_news(&self, limit: usize) -> NewsFeed {
        let sources = match self.sources.find_all().await {
            Ok(sources) => sources,
            Err(e) => {
                warn!("Failed to list sources for aggregation: {:#}", e);
                return NewsFeed {
                    news: Vec::new(),
                    partial: true,
                };
            }
        };

        let mut feed = NewsFeed {
            news: Vec::new(),
            partial: false,
        };

        for source in sources {
            let articles = match self.articles.find_by_source_id(source.id(), limit).await {
                Ok(articles) => articles,
                Err(e) => {
                    warn!("Failed to load articles for '{}': {:#}", source.name(), e);
                    feed.partial = true;
                    continue;
                }
            };

            for article in articles {
                feed.news.push(NewsItem {
                    id: article.id(),
                    title: article.title().to_string(),
                    link: article.link().to_string(),
                    description: article.description().map(str::to_string),
                    published: article.published_at().map(|dt| dt.to_rfc3339()),
                    source: source.name().to_string(),
                    bias: source.bias(),
                });
            }
        }

        feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Article, Source};
    use crate::repository::{MemoryArticleRepository, MemorySourceRepository};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    async fn seed_source(repo: &MemorySourceRepository, name: &str, bias: Bias) -> Source {
        let source = Source::new(name, None, bias).unwrap();
        repo.save(&source).await.unwrap();
        source
    }

    async fn seed_articles(repo: &MemoryArticleRepository, source: &Source, count: usize) {
        for i in 0..count {
            let article = Article::new(
                format!("{} headline {i}", source.name()),
                format!("https://example.com/{}/{i}", source.id()),
                source.id(),
                None,
                Some(Utc::now() - Duration::hours(count as i64 - i as i64)),
            )
            .unwrap();
            repo.save(&article).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_limit_caps_each_source() {
        let sources = Arc::new(MemorySourceRepository::new());
        let articles = Arc::new(MemoryArticleRepository::new());
        let source = seed_source(&sources, "El País", Bias::Left).await;
        seed_articles(&articles, &source, 5).await;

        let feed = NewsQuery::new(sources, articles).get_news(3).await;

        assert!(!feed.partial);
        assert_eq!(feed.news.len(), 3);
        for item in &feed.news {
            assert_eq!(item.source, "El País");
            assert_eq!(item.bias, Bias::Left);
        }
    }

    #[tokio::test]
    async fn test_aggregates_across_sources() {
        let sources = Arc::new(MemorySourceRepository::new());
        let articles = Arc::new(MemoryArticleRepository::new());
        let left = seed_source(&sources, "El Diario", Bias::Left).await;
        let right = seed_source(&sources, "ABC", Bias::Right).await;
        seed_articles(&articles, &left, 2).await;
        seed_articles(&articles, &right, 2).await;

        let feed = NewsQuery::new(sources, articles).get_news(10).await;

        assert_eq!(feed.news.len(), 4);
        assert_eq!(feed.news.iter().filter(|i| i.bias == Bias::Left).count(), 2);
        assert_eq!(feed.news.iter().filter(|i| i.bias == Bias::Right).count(), 2);
    }

    #[tokio::test]
    async fn test_published_serialized_as_iso8601_or_null() {
        let sources = Arc::new(MemorySourceRepository::new());
        let articles = Arc::new(MemoryArticleRepository::new());
        let source = seed_source(&sources, "El País", Bias::Left).await;

        let dated = Article::new(
            "Dated",
            "https://example.com/dated",
            source.id(),
            None,
            Some(Utc.with_ymd_and_hms(2024, 12, 9, 12, 0, 0).unwrap()),
        )
        .unwrap();
        let undated =
            Article::new("Undated", "https://example.com/undated", source.id(), None, None)
                .unwrap();
        articles.save(&dated).await.unwrap();
        articles.save(&undated).await.unwrap();

        let feed = NewsQuery::new(sources, articles).get_news(10).await;

        let dated_item = feed.news.iter().find(|i| i.title == "Dated").unwrap();
        assert_eq!(dated_item.published.as_deref(), Some("2024-12-09T12:00:00+00:00"));
        let undated_item = feed.news.iter().find(|i| i.title == "Undated").unwrap();
        assert!(undated_item.published.is_none());
    }

    #[tokio::test]
    async fn test_empty_storage_yields_empty_feed() {
        let sources = Arc::new(MemorySourceRepository::new());
        let articles = Arc::new(MemoryArticleRepository::new());

        let feed = NewsQuery::new(sources, articles).get_news(10).await;

        assert!(feed.news.is_empty());
        assert!(!feed.partial);
    }

    struct FailingArticleRepository;

    #[async_trait]
    impl ArticleRepository for FailingArticleRepository {
        async fn save(&self, _article: &Article) -> anyhow::Result<()> {
            anyhow::bail!("storage offline")
        }
        async fn find_by_id(&self, _id: Uuid) -> anyhow::Result<Option<Article>> {
            anyhow::bail!("storage offline")
        }
        async fn find_by_link(&self, _link: &str) -> anyhow::Result<Option<Article>> {
            anyhow::bail!("storage offline")
        }
        async fn find_by_source_id(
            &self,
            _source_id: Uuid,
            _limit: usize,
        ) -> anyhow::Result<Vec<Article>> {
            anyhow::bail!("storage offline")
        }
        async fn find_by_group_id(&self, _group_id: Uuid) -> anyhow::Result<Vec<Article>> {
            anyhow::bail!("storage offline")
        }
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_to_partial() {
        let sources = Arc::new(MemorySourceRepository::new());
        seed_source(&sources, "El País", Bias::Left).await;

        let feed = NewsQuery::new(sources, Arc::new(FailingArticleRepository))
            .get_news(10)
            .await;

        assert!(feed.partial);
        assert!(feed.news.is_empty());
    }
}
