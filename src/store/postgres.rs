//! PostgreSQL-backed artifact store
//!
//! Artifacts live in a single `artifacts` table with the payload stored
//! inline as BYTEA; descriptor queries never touch the payload column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ArtifactCategory, ArtifactDescriptor, ArtifactStore, StoreError};

const DESCRIPTOR_COLUMNS: &str = "id, filename, category, size_bytes, published_at";

/// Metadata supplied by the operator when publishing an artifact.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub filename: String,
    pub category: ArtifactCategory,
    pub published_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PgArtifactStore {
    pool: PgPool,
}

impl PgArtifactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Publish a new artifact. Artifacts are immutable; republishing the
    /// same logical model means inserting a new row with a fresh timestamp.
    pub async fn insert(
        &self,
        meta: NewArtifact,
        payload: &[u8],
    ) -> Result<ArtifactDescriptor, sqlx::Error> {
        sqlx::query_as::<_, ArtifactDescriptor>(
            r#"
            INSERT INTO artifacts (filename, category, size_bytes, payload, published_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, filename, category, size_bytes, published_at
            "#,
        )
        .bind(&meta.filename)
        .bind(meta.category)
        .bind(payload.len() as i64)
        .bind(payload)
        .bind(meta.published_at)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ArtifactDescriptor>, sqlx::Error> {
        sqlx::query_as::<_, ArtifactDescriptor>(&format!(
            "SELECT {DESCRIPTOR_COLUMNS} FROM artifacts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list(&self) -> Result<Vec<ArtifactDescriptor>, sqlx::Error> {
        sqlx::query_as::<_, ArtifactDescriptor>(&format!(
            "SELECT {DESCRIPTOR_COLUMNS} FROM artifacts ORDER BY published_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM artifacts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ArtifactStore for PgArtifactStore {
    async fn find_latest(
        &self,
        category: ArtifactCategory,
    ) -> Result<Option<ArtifactDescriptor>, StoreError> {
        let row = sqlx::query_as::<_, ArtifactDescriptor>(&format!(
            r#"
            SELECT {DESCRIPTOR_COLUMNS} FROM artifacts
            WHERE category = $1
            ORDER BY published_at DESC
            LIMIT 1
            "#
        ))
        .bind(category)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_since(
        &self,
        category: ArtifactCategory,
        since: DateTime<Utc>,
    ) -> Result<Vec<ArtifactDescriptor>, StoreError> {
        let rows = sqlx::query_as::<_, ArtifactDescriptor>(&format!(
            r#"
            SELECT {DESCRIPTOR_COLUMNS} FROM artifacts
            WHERE category = $1 AND published_at >= $2
            ORDER BY published_at DESC
            "#
        ))
        .bind(category)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_all(
        &self,
        category: ArtifactCategory,
    ) -> Result<Vec<ArtifactDescriptor>, StoreError> {
        let rows = sqlx::query_as::<_, ArtifactDescriptor>(&format!(
            r#"
            SELECT {DESCRIPTOR_COLUMNS} FROM artifacts
            WHERE category = $1
            ORDER BY published_at DESC
            "#
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn read_payload(
        &self,
        descriptor: &ArtifactDescriptor,
    ) -> Result<Vec<u8>, StoreError> {
        let payload = sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT payload FROM artifacts WHERE id = $1",
        )
        .bind(descriptor.id)
        .fetch_optional(&self.pool)
        .await?;

        payload.ok_or(StoreError::MissingPayload(descriptor.id))
    }
}
