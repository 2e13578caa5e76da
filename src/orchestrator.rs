//! Inference orchestration
//!
//! Turns one RSSI vector into one position using the currently resolved
//! model set: clustering predict selects the coarse region, the matching
//! per-cluster classifier refines it to a reference point, and the
//! classifier's coordinate table yields the final (x, y).

use serde::Serialize;

use crate::cache::ResolutionCache;
use crate::resolver::{ModelSet, ResolveError};

/// One inference outcome. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PositionResult {
    pub x: f64,
    pub y: f64,
    pub reference_point: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("invalid rssi vector: {0}")]
    InvalidInput(String),

    /// Unreachable for a set the resolver produced; kept as a defensive
    /// check on the completeness invariant.
    #[error("no classifier available for predicted cluster {0}")]
    NoMatchingClassifier(usize),

    #[error("classifier for cluster {cluster} has no coordinates for reference point '{label}'")]
    UnknownReferencePoint { cluster: usize, label: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Estimate a position for one RSSI reading.
///
/// The vector must be non-empty, finite, and match the access-point
/// ordering and count the active models were trained on; ordering is the
/// caller's responsibility.
pub async fn predict_position(
    cache: &ResolutionCache,
    rssi: &[f64],
) -> Result<PositionResult, PredictError> {
    if rssi.is_empty() {
        return Err(PredictError::InvalidInput("empty rssi vector".into()));
    }
    if rssi.iter().any(|v| !v.is_finite()) {
        return Err(PredictError::InvalidInput(
            "rssi values must be finite".into(),
        ));
    }

    let set = cache.get_current().await?;
    predict_with(&set, rssi)
}

fn predict_with(set: &ModelSet, rssi: &[f64]) -> Result<PositionResult, PredictError> {
    let expected = set.clustering.dimension();
    if rssi.len() != expected {
        return Err(PredictError::InvalidInput(format!(
            "expected {expected} readings, got {}",
            rssi.len()
        )));
    }

    let cluster = set.clustering.predict(rssi);

    let classifier = set.classifiers.get(&cluster).ok_or_else(|| {
        tracing::error!(
            cluster,
            version = %set.clustering_version,
            "resolved model set is missing a classifier for a predicted cluster"
        );
        PredictError::NoMatchingClassifier(cluster)
    })?;

    let label = classifier.model.predict(rssi);
    let position = classifier.model.position_of(label).ok_or_else(|| {
        tracing::error!(
            cluster,
            label,
            "classifier predicted a reference point with no coordinates"
        );
        PredictError::UnknownReferencePoint {
            cluster,
            label: label.to_string(),
        }
    })?;

    Ok(PositionResult {
        x: position.x,
        y: position.y,
        reference_point: label.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{self, CENTROIDS_SCHEMA, KNN_SCHEMA};
    use crate::resolver::tests::t;
    use crate::resolver::ResolvedClassifier;
    use crate::store::memory::InMemoryStore;
    use crate::store::{ArtifactCategory, ArtifactDescriptor, ArtifactStore};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use uuid::Uuid;

    /// Three clusters along one axis; a reading near -60 lands in cluster 1.
    fn clustering_bytes() -> Vec<u8> {
        json!({
            "schema": CENTROIDS_SCHEMA,
            "centroids": [[-30.0, 0.0], [-60.0, 0.0], [-90.0, 0.0]],
        })
        .to_string()
        .into_bytes()
    }

    fn classifier_bytes(label: &str, x: f64, y: f64) -> Vec<u8> {
        json!({
            "schema": KNN_SCHEMA,
            "k": 1,
            "samples": [{ "rssi": [-60.0, 0.0], "label": label }],
            "reference_points": { label: { "x": x, "y": y } },
        })
        .to_string()
        .into_bytes()
    }

    fn descriptor(filename: &str) -> ArtifactDescriptor {
        ArtifactDescriptor {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            category: ArtifactCategory::Classifier,
            size_bytes: 0,
            published_at: t(1),
        }
    }

    fn model_set() -> ModelSet {
        let clustering = model::decode_clustering(&clustering_bytes()).unwrap();
        let mut classifiers = BTreeMap::new();
        for (index, (label, x, y)) in [("RP_A", 1.0, 2.0), ("RP_B", 3.0, 4.0), ("RP_C", 5.0, 6.0)]
            .into_iter()
            .enumerate()
        {
            classifiers.insert(
                index,
                ResolvedClassifier {
                    artifact: descriptor(&format!("knn_{index}")),
                    model: model::decode_classifier(&classifier_bytes(label, x, y)).unwrap(),
                },
            );
        }
        ModelSet {
            clustering_version: t(0),
            clustering_artifact: ArtifactDescriptor {
                id: Uuid::new_v4(),
                filename: "kmeans_model".to_string(),
                category: ArtifactCategory::Clustering,
                size_bytes: 0,
                published_at: t(0),
            },
            clustering,
            classifiers,
        }
    }

    #[test]
    fn selects_the_classifier_for_the_predicted_cluster() {
        let set = model_set();

        // Nearest centroid is index 1; the answer must come from RP_B and
        // never from cluster 0 or 2.
        let result = predict_with(&set, &[-61.0, 0.5]).unwrap();
        assert_eq!(result.reference_point, "RP_B");
        assert_eq!(result.x, 3.0);
        assert_eq!(result.y, 4.0);
    }

    #[test]
    fn a_gap_in_the_set_is_detected_defensively() {
        let mut set = model_set();
        set.classifiers.remove(&1);

        let err = predict_with(&set, &[-61.0, 0.5]).unwrap_err();
        assert!(matches!(err, PredictError::NoMatchingClassifier(1)));
    }

    #[test]
    fn wrong_dimension_is_invalid_input() {
        let set = model_set();
        let err = predict_with(&set, &[-61.0]).unwrap_err();
        assert!(matches!(err, PredictError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn empty_and_non_finite_vectors_are_rejected_before_store_access() {
        // An empty store would fail with NotFound if the orchestrator ever
        // reached it; input validation must trip first.
        let cache = ResolutionCache::new(Arc::new(InMemoryStore::new()) as Arc<dyn ArtifactStore>);

        let err = predict_position(&cache, &[]).await.unwrap_err();
        assert!(matches!(err, PredictError::InvalidInput(_)));

        let err = predict_position(&cache, &[-40.0, f64::NAN]).await.unwrap_err();
        assert!(matches!(err, PredictError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unconfigured_service_surfaces_not_found() {
        let cache = ResolutionCache::new(Arc::new(InMemoryStore::new()) as Arc<dyn ArtifactStore>);

        let err = predict_position(&cache, &[-40.0, -50.0]).await.unwrap_err();
        assert!(matches!(err, PredictError::Resolve(ResolveError::NotFound)));
    }

    #[tokio::test]
    async fn end_to_end_through_store_cache_and_models() {
        let store = Arc::new(InMemoryStore::new());
        store.publish(
            "kmeans_model",
            ArtifactCategory::Clustering,
            t(0),
            clustering_bytes(),
        );
        store.publish("knn_0", ArtifactCategory::Classifier, t(1), classifier_bytes("RP_A", 1.0, 2.0));
        store.publish("knn_1", ArtifactCategory::Classifier, t(1), classifier_bytes("RP_B", 3.0, 4.0));
        store.publish("knn_2", ArtifactCategory::Classifier, t(1), classifier_bytes("RP_C", 5.0, 6.0));
        let cache = ResolutionCache::new(store as Arc<dyn ArtifactStore>);

        let result = predict_position(&cache, &[-88.0, 1.0]).await.unwrap();
        assert_eq!(result.reference_point, "RP_C");
        assert_eq!(result.x, 5.0);
    }
}
