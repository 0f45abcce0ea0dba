use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 200;
const MAX_TITLE_LEN: usize = 500;
const MAX_LINK_LEN: usize = 1000;
const MAX_SUMMARY_LEN: usize = 2000;
const TOPIC_HASH_LEN: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("source name must be between 1 and 200 characters")]
    InvalidSourceName,
    #[error("article title must be between 1 and 500 characters")]
    InvalidTitle,
    #[error("article link must be between 1 and 1000 characters")]
    InvalidLinkLength,
    #[error("article link must be an http:// or https:// URL")]
    InvalidLinkScheme,
    #[error("bias must be one of left, center, right, got: {0}")]
    InvalidBias(String),
    #[error("topic hash must be exactly 16 characters")]
    InvalidTopicHash,
    #[error("group summary must be at most 2000 characters")]
    InvalidSummary,
}

/// Editorial leaning of a publication outlet.
///
/// Serialized as the exact lowercase tokens `left`, `center`, `right`;
/// anything else is rejected, case included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Left,
    Center,
    Right,
}

impl Bias {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "left" => Ok(Bias::Left),
            "center" => Ok(Bias::Center),
            "right" => Ok(Bias::Right),
            other => Err(DomainError::InvalidBias(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Left => "left",
            Bias::Center => "center",
            Bias::Right => "right",
        }
    }
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-length fingerprint of a normalized article title, used as the
/// coarse grouping key. Equality is raw string equality; collisions between
/// distinct titles are an accepted trade-off.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicHash(String);

impl TopicHash {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.chars().count() != TOPIC_HASH_LEN {
            return Err(DomainError::InvalidTopicHash);
        }
        Ok(Self(value))
    }

    /// Derives the hash from a title: lowercase, trim, SHA-256, first 16 hex
    /// digits. Deterministic for any two titles with the same normal form.
    pub fn from_title(title: &str) -> Self {
        let lowered = title.to_lowercase();
        let normalized = lowered.trim();
        let digest = Sha256::digest(normalized.as_bytes());
        let hex = format!("{:x}", digest);
        Self(hex[..TOPIC_HASH_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TopicHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A publication outlet. Created once per distinct name during ingestion;
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    id: Uuid,
    name: String,
    url: Option<String>,
    bias: Bias,
}

impl Source {
    pub fn new(name: impl Into<String>, url: Option<String>, bias: Bias) -> Result<Self, DomainError> {
        Self::build(Uuid::new_v4(), name, url, bias)
    }

    /// Rehydrates a source from stored fields, re-running validation.
    pub fn build(
        id: Uuid,
        name: impl Into<String>,
        url: Option<String>,
        bias: Bias,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::InvalidSourceName);
        }
        Ok(Self { id, name, url, bias })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn bias(&self) -> Bias {
        self.bias
    }
}

/// One fetched news item. The link is the system-wide dedup key: at most one
/// stored article per distinct link.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    id: Uuid,
    title: String,
    link: String,
    description: Option<String>,
    published_at: Option<DateTime<Utc>>,
    source_id: Uuid,
    group_id: Option<Uuid>,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        source_id: Uuid,
        description: Option<String>,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        Self::build(
            Uuid::new_v4(),
            title,
            link,
            source_id,
            description,
            published_at,
            None,
        )
    }

    pub fn build(
        id: Uuid,
        title: impl Into<String>,
        link: impl Into<String>,
        source_id: Uuid,
        description: Option<String>,
        published_at: Option<DateTime<Utc>>,
        group_id: Option<Uuid>,
    ) -> Result<Self, DomainError> {
        let title = title.into();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(DomainError::InvalidTitle);
        }
        let link = link.into();
        if link.is_empty() || link.chars().count() > MAX_LINK_LEN {
            return Err(DomainError::InvalidLinkLength);
        }
        if !link.starts_with("http://") && !link.starts_with("https://") {
            return Err(DomainError::InvalidLinkScheme);
        }
        Ok(Self {
            id,
            title,
            link,
            description,
            published_at,
            source_id,
            group_id,
        })
    }

    /// Returns a new article carrying the resolved group id. The group-less
    /// original is meant to be discarded; fields are never mutated in place.
    pub fn with_group(&self, group_id: Uuid) -> Self {
        Self {
            group_id: Some(group_id),
            ..self.clone()
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn source_id(&self) -> Uuid {
        self.source_id
    }

    pub fn group_id(&self) -> Option<Uuid> {
        self.group_id
    }
}

/// A cluster of articles believed to cover the same topic.
///
/// The embedding is present only when similarity-based matching created the
/// group; the topic hash is always populated for traceability.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsGroup {
    id: Uuid,
    topic_hash: TopicHash,
    summary: Option<String>,
    created_at: DateTime<Utc>,
    embedding: Option<Vec<f32>>,
}

impl NewsGroup {
    pub fn new(topic_hash: TopicHash, embedding: Option<Vec<f32>>) -> Result<Self, DomainError> {
        Self::build(Uuid::new_v4(), topic_hash, None, Utc::now(), embedding)
    }

    pub fn build(
        id: Uuid,
        topic_hash: TopicHash,
        summary: Option<String>,
        created_at: DateTime<Utc>,
        embedding: Option<Vec<f32>>,
    ) -> Result<Self, DomainError> {
        if let Some(summary) = &summary {
            if summary.chars().count() > MAX_SUMMARY_LEN {
                return Err(DomainError::InvalidSummary);
            }
        }
        Ok(Self {
            id,
            topic_hash,
            summary,
            created_at,
            embedding,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic_hash(&self) -> &TopicHash {
        &self.topic_hash
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }
}
