//! Resolution cache
//!
//! Memoizes the resolved model set keyed by the clustering artifact's
//! publish timestamp. Every call revalidates with one cheap `find_latest`
//! query; the full resolution (payload reads plus decoding) only runs when
//! the clustering version actually changed. Resolution is lazy and driven
//! by request traffic; there is no background refresh.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::resolver::{self, ModelSet, ResolveError};
use crate::store::{ArtifactCategory, ArtifactStore};

pub struct ResolutionCache {
    store: Arc<dyn ArtifactStore>,
    current: RwLock<Option<Arc<ModelSet>>>,
}

impl ResolutionCache {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    /// The current consistent model set, re-resolving if a newer clustering
    /// artifact has been published since the cached one.
    ///
    /// Readers always see either the previous complete set or the new
    /// complete set; the replacement is a single pointer swap. Concurrent
    /// misses may resolve redundantly, which is harmless.
    pub async fn get_current(&self) -> Result<Arc<ModelSet>, ResolveError> {
        let latest = self
            .store
            .find_latest(ArtifactCategory::Clustering)
            .await?
            .ok_or(ResolveError::NotFound)?;

        if let Some(set) = self.current.read().await.as_ref() {
            if set.clustering_version == latest.published_at {
                return Ok(Arc::clone(set));
            }
        }

        let set = Arc::new(resolver::resolve(self.store.as_ref()).await?);
        *self.current.write().await = Some(Arc::clone(&set));
        Ok(set)
    }
}
