//! Artifact store - typed read-only view over the model blob store
//!
//! The resolver only ever consumes the [`ArtifactStore`] trait; the
//! administrative surface (upload/download/delete) lives on the concrete
//! Postgres backend.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use postgres::PgArtifactStore;

/// Role of a published model artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "artifact_category", rename_all = "lowercase")]
pub enum ArtifactCategory {
    Clustering,
    Classifier,
}

impl ArtifactCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactCategory::Clustering => "clustering",
            ArtifactCategory::Classifier => "classifier",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "clustering" => Some(ArtifactCategory::Clustering),
            "classifier" => Some(ArtifactCategory::Classifier),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArtifactCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata of one published model artifact. The payload itself is read
/// separately; descriptors are immutable once published.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ArtifactDescriptor {
    pub id: Uuid,
    pub filename: String,
    pub category: ArtifactCategory,
    pub size_bytes: i64,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("artifact {0} has no stored payload")]
    MissingPayload(Uuid),
}

/// Read-only store contract consumed by the version resolver.
///
/// All listing methods return descriptors sorted by `published_at`
/// descending; the store never mutates artifacts on behalf of the core.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// The single most recently published artifact of a category.
    async fn find_latest(
        &self,
        category: ArtifactCategory,
    ) -> Result<Option<ArtifactDescriptor>, StoreError>;

    /// All artifacts of a category published at or after `since`.
    async fn find_since(
        &self,
        category: ArtifactCategory,
        since: DateTime<Utc>,
    ) -> Result<Vec<ArtifactDescriptor>, StoreError>;

    /// The full unbounded history of a category.
    async fn find_all(
        &self,
        category: ArtifactCategory,
    ) -> Result<Vec<ArtifactDescriptor>, StoreError>;

    /// Sequential read of an artifact's payload bytes.
    async fn read_payload(
        &self,
        descriptor: &ArtifactDescriptor,
    ) -> Result<Vec<u8>, StoreError>;
}
