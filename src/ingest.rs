use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::FeedConfig;
use crate::domain::{Article, Bias, Source};
use crate::fetcher::{FeedEntry, FeedFetcher};
use crate::grouping::TopicResolver;
use crate::repository::{ArticleRepository, SourceRepository};

/// Per-source ingestion tally.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Articles newly persisted with a group assignment.
    pub stored: usize,
    /// Entries skipped because their link was already stored.
    pub skipped: usize,
    /// Entries that failed validation or group resolution.
    pub failed: usize,
}

/// Drives one ingestion cycle per source: ensure the source record exists,
/// fetch entries, dedupe by link, resolve a topic group, persist.
pub struct Ingestor {
    sources: Arc<dyn SourceRepository>,
    articles: Arc<dyn ArticleRepository>,
    fetcher: Arc<dyn FeedFetcher>,
    resolver: Arc<dyn TopicResolver>,
    running: Arc<RwLock<bool>>,
}

impl Ingestor {
    pub fn new(
        sources: Arc<dyn SourceRepository>,
        articles: Arc<dyn ArticleRepository>,
        fetcher: Arc<dyn FeedFetcher>,
        resolver: Arc<dyn TopicResolver>,
    ) -> Self {
        Self {
            sources,
            articles,
            fetcher,
            resolver,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Runs the full feed table, one source at a time. A source that fails
    /// never aborts the others.
    pub async fn ingest_all(&self, feeds: &[FeedConfig], limit: usize) -> anyhow::Result<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                info!("Ingest already in progress, skipping");
                return Ok(());
            }
            *running = true;
        }

        let result = self.do_ingest_all(feeds, limit).await;

        {
            let mut running = self.running.write().await;
            *running = false;
        }

        result
    }

    async fn do_ingest_all(&self, feeds: &[FeedConfig], limit: usize) -> anyhow::Result<()> {
        info!("Ingesting {} feeds", feeds.len());

        for feed in feeds {
            match self
                .ingest_source(&feed.name, &feed.url, feed.bias, limit)
                .await
            {
                Ok(outcome) => info!(
                    "Ingested '{}': {} stored, {} skipped, {} failed",
                    feed.name, outcome.stored, outcome.skipped, outcome.failed
                ),
                Err(e) => error!("Failed to ingest source '{}': {:#}", feed.name, e),
            }
        }

        info!("Ingest complete");
        Ok(())
    }

    /// Ingests up to `limit` entries from one source's feed; entries past
    /// the limit are ignored entirely.
    pub async fn ingest_source(
        &self,
        name: &str,
        url: &str,
        bias: Bias,
        limit: usize,
    ) -> anyhow::Result<IngestOutcome> {
        let source = self.ensure_source(name, url, bias).await?;

        let entries = self.fetcher.fetch(url).await?;

        let mut outcome = IngestOutcome::default();
        for entry in entries.into_iter().take(limit) {
            match self.ingest_entry(&source, entry).await {
                Ok(true) => outcome.stored += 1,
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    warn!("Failed to process entry from '{}': {:#}", name, e);
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Returns `Ok(false)` when the entry's link is already stored.
    async fn ingest_entry(&self, source: &Source, entry: FeedEntry) -> anyhow::Result<bool> {
        let article = Article::new(
            entry.title,
            entry.link,
            source.id(),
            entry.description,
            entry.published,
        )?;

        if self.articles.find_by_link(article.link()).await?.is_some() {
            return Ok(false);
        }

        let group = self.resolver.resolve(article.title()).await?;

        let article = article.with_group(group.id());
        self.articles.save(&article).await?;
        Ok(true)
    }

    /// Resolve-or-create by exact name. First-seen wins: re-running for an
    /// existing name never updates its URL or bias.
    async fn ensure_source(&self, name: &str, url: &str, bias: Bias) -> anyhow::Result<Source> {
        if let Some(source) = self.sources.find_by_name(name).await? {
            return Ok(source);
        }

        let source = Source::new(name, Some(url.to_string()), bias)?;
        self.sources.save(&source).await?;

        // Re-read so a concurrent creator's record wins the name.
        Ok(self
            .sources
            .find_by_name(name)
            .await?
            .unwrap_or(source))
    }
}

/// Periodic ingestion: one run at startup, then one per interval.
pub async fn start_background_ingest(
    ingestor: Arc<Ingestor>,
    feeds: Vec<FeedConfig>,
    limit: usize,
    interval_minutes: u64,
) {
    let interval = Duration::from_secs(interval_minutes * 60);

    info!("Starting initial ingest");
    if let Err(e) = ingestor.ingest_all(&feeds, limit).await {
        error!("Initial ingest failed: {:#}", e);
    }

    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled ingest");
        if let Err(e) = ingestor.ingest_all(&feeds, limit).await {
            error!("Scheduled ingest failed: {:#}", e);
        }
    }
}
