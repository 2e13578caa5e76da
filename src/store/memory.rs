//! In-memory artifact store used as the test double for the resolver,
//! cache, and orchestrator.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ArtifactCategory, ArtifactDescriptor, ArtifactStore, StoreError};

#[derive(Default)]
pub struct InMemoryStore {
    artifacts: Mutex<Vec<(ArtifactDescriptor, Vec<u8>)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(
        &self,
        filename: &str,
        category: ArtifactCategory,
        published_at: DateTime<Utc>,
        payload: Vec<u8>,
    ) -> Uuid {
        let descriptor = ArtifactDescriptor {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            category,
            size_bytes: payload.len() as i64,
            published_at,
        };
        let id = descriptor.id;
        self.artifacts.lock().unwrap().push((descriptor, payload));
        id
    }

    fn sorted(&self, category: ArtifactCategory) -> Vec<ArtifactDescriptor> {
        let mut matching: Vec<ArtifactDescriptor> = self
            .artifacts
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d.category == category)
            .map(|(d, _)| d.clone())
            .collect();
        matching.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        matching
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    async fn find_latest(
        &self,
        category: ArtifactCategory,
    ) -> Result<Option<ArtifactDescriptor>, StoreError> {
        Ok(self.sorted(category).into_iter().next())
    }

    async fn find_since(
        &self,
        category: ArtifactCategory,
        since: DateTime<Utc>,
    ) -> Result<Vec<ArtifactDescriptor>, StoreError> {
        Ok(self
            .sorted(category)
            .into_iter()
            .filter(|d| d.published_at >= since)
            .collect())
    }

    async fn find_all(
        &self,
        category: ArtifactCategory,
    ) -> Result<Vec<ArtifactDescriptor>, StoreError> {
        Ok(self.sorted(category))
    }

    async fn read_payload(
        &self,
        descriptor: &ArtifactDescriptor,
    ) -> Result<Vec<u8>, StoreError> {
        self.artifacts
            .lock()
            .unwrap()
            .iter()
            .find(|(d, _)| d.id == descriptor.id)
            .map(|(_, payload)| payload.clone())
            .ok_or(StoreError::MissingPayload(descriptor.id))
    }
}
