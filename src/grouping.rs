//! Topic matching: decides whether an incoming article joins an existing
//! news group or starts a new one.
//!
//! Two interchangeable policies exist. Hash matching fingerprints the
//! normalized title and reuses the group with the identical fingerprint.
//! Similarity matching embeds the title and scans every stored group for
//! the best cosine score at or above a threshold. The scan is a full pass
//! over all groups, which only holds up while group cardinality stays small.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{NewsGroup, TopicHash};
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::repository::NewsGroupRepository;

#[async_trait]
pub trait TopicResolver: Send + Sync {
    /// Returns the group the titled article belongs to, creating and
    /// persisting a new one when nothing qualifies.
    async fn resolve(&self, title: &str) -> anyhow::Result<NewsGroup>;
}

/// Exact-hash matching over normalized titles. Two distinct titles whose
/// normal forms hash identically land in the same group; that collision
/// risk is accepted, not detected.
pub struct HashResolver {
    groups: Arc<dyn NewsGroupRepository>,
}

impl HashResolver {
    pub fn new(groups: Arc<dyn NewsGroupRepository>) -> Self {
        Self { groups }
    }
}

#[async_trait]
impl TopicResolver for HashResolver {
    async fn resolve(&self, title: &str) -> anyhow::Result<NewsGroup> {
        let hash = TopicHash::from_title(title);

        if let Some(group) = self.groups.find_by_topic_hash(&hash).await? {
            return Ok(group);
        }

        let group = NewsGroup::new(hash.clone(), None)?;
        self.groups.save(&group).await?;

        // Re-read so a concurrent creator's instance wins; the save above
        // was a no-op in that race.
        Ok(self
            .groups
            .find_by_topic_hash(&hash)
            .await?
            .unwrap_or(group))
    }
}

/// Nearest-neighbor matching over title embeddings with a score threshold.
pub struct SimilarityResolver {
    groups: Arc<dyn NewsGroupRepository>,
    embeddings: Arc<dyn EmbeddingProvider>,
    threshold: f32,
}

impl SimilarityResolver {
    pub fn new(
        groups: Arc<dyn NewsGroupRepository>,
        embeddings: Arc<dyn EmbeddingProvider>,
        threshold: f32,
    ) -> Self {
        Self {
            groups,
            embeddings,
            threshold,
        }
    }
}

#[async_trait]
impl TopicResolver for SimilarityResolver {
    async fn resolve(&self, title: &str) -> anyhow::Result<NewsGroup> {
        let vector = self.embeddings.generate(title).await?;

        let existing = self.groups.find_all().await?;

        // The scan must complete: the globally best-scoring group wins, not
        // the first one past the threshold. Strict `>` keeps the earliest
        // group on equal scores.
        let mut best: Option<&NewsGroup> = None;
        let mut best_score = 0.0f32;
        for group in &existing {
            let Some(candidate) = group.embedding() else {
                continue;
            };
            let score = cosine_similarity(&vector, candidate)?;
            if score > best_score && score >= self.threshold {
                best_score = score;
                best = Some(group);
            }
        }

        if let Some(group) = best {
            return Ok(group.clone());
        }

        // No qualifying group: persist a new one carrying the embedding and
        // a topic hash kept for traceability only.
        let hash = TopicHash::from_title(title);
        let group = NewsGroup::new(hash.clone(), Some(vector))?;
        self.groups.save(&group).await?;

        Ok(self
            .groups
            .find_by_topic_hash(&hash)
            .await?
            .unwrap_or(group))
    }
}
