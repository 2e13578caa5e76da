//! Model version resolution
//!
//! Picks a mutually consistent model set out of an unbounded, growing
//! history of published artifacts: the latest clustering model plus
//! exactly one classifier per cluster it defines. Training pipelines
//! publish independently and at different cadences, so classifier lookup
//! is windowed to the clustering artifact's publish time first and widened
//! to the full history only when the window comes up short.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::model::{self, ClassifierModel, ClusteringModel, DecodeError};
use crate::store::{ArtifactCategory, ArtifactDescriptor, ArtifactStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no clustering model has been published")]
    NotFound,

    #[error("failed to decode artifact '{filename}': {source}")]
    Decode {
        filename: String,
        #[source]
        source: DecodeError,
    },

    #[error("classifier coverage does not match {required} clusters (missing indices: {missing:?}, duplicated indices: {duplicated:?}, out-of-range indices: {out_of_range:?})")]
    Inconsistent {
        required: usize,
        missing: Vec<usize>,
        duplicated: Vec<usize>,
        out_of_range: Vec<usize>,
    },

    #[error("classifier '{filename}' was trained on {found}-dimensional readings but the clustering model expects {expected}")]
    DimensionMismatch {
        filename: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One decoded classifier together with the artifact it came from.
#[derive(Debug, Clone)]
pub struct ResolvedClassifier {
    pub artifact: ArtifactDescriptor,
    pub model: ClassifierModel,
}

/// A complete, immutable model set bound to one clustering version.
///
/// `classifiers` always covers every index in `[0, cluster_count)`; the
/// set is built fully off to the side and never mutated after resolution.
#[derive(Debug, Clone)]
pub struct ModelSet {
    pub clustering_version: DateTime<Utc>,
    pub clustering_artifact: ArtifactDescriptor,
    pub clustering: ClusteringModel,
    pub classifiers: BTreeMap<usize, ResolvedClassifier>,
}

/// Resolve the current consistent model set from the store.
///
/// All-or-nothing: a decode failure for any member fails the whole
/// resolution; a partial set is never returned.
pub async fn resolve(store: &dyn ArtifactStore) -> Result<ModelSet, ResolveError> {
    let clustering_artifact = store
        .find_latest(ArtifactCategory::Clustering)
        .await?
        .ok_or(ResolveError::NotFound)?;

    let payload = store.read_payload(&clustering_artifact).await?;
    let clustering = model::decode_clustering(&payload).map_err(|source| ResolveError::Decode {
        filename: clustering_artifact.filename.clone(),
        source,
    })?;
    let required = clustering.cluster_count();

    // Windowed lookup first: classifiers published at or after the
    // clustering artifact.
    let windowed = store
        .find_since(ArtifactCategory::Classifier, clustering_artifact.published_at)
        .await?;
    let mut by_filename = dedup_keep_latest(windowed);

    if by_filename.len() < required {
        // Clustering may have been retrained without retraining every
        // classifier; widen to the unbounded history.
        tracing::debug!(
            windowed = by_filename.len(),
            required,
            "classifier window incomplete, widening to full history"
        );
        by_filename = dedup_keep_latest(store.find_all(ArtifactCategory::Classifier).await?);
    }

    let mut by_index: HashMap<usize, ArtifactDescriptor> = HashMap::new();
    let mut duplicated = Vec::new();
    let mut out_of_range = Vec::new();
    for (_, artifact) in by_filename {
        let Some(index) = cluster_index(&artifact.filename) else {
            tracing::warn!(
                filename = %artifact.filename,
                "ignoring classifier artifact with no trailing cluster index"
            );
            continue;
        };
        if index >= required {
            // Leftover from an older clustering run with more clusters; a
            // complete set may still exist, so this alone is not fatal.
            tracing::warn!(
                filename = %artifact.filename,
                index,
                required,
                "ignoring classifier artifact outside the cluster range"
            );
            out_of_range.push(index);
            continue;
        }
        if by_index.insert(index, artifact).is_some() {
            duplicated.push(index);
        }
    }

    let missing: Vec<usize> = (0..required).filter(|i| !by_index.contains_key(i)).collect();
    if !missing.is_empty() || !duplicated.is_empty() {
        duplicated.sort_unstable();
        out_of_range.sort_unstable();
        return Err(ResolveError::Inconsistent {
            required,
            missing,
            duplicated,
            out_of_range,
        });
    }

    let mut classifiers = BTreeMap::new();
    for (index, artifact) in by_index {
        let bytes = store.read_payload(&artifact).await?;
        let classifier =
            model::decode_classifier(&bytes).map_err(|source| ResolveError::Decode {
                filename: artifact.filename.clone(),
                source,
            })?;
        if classifier.dimension() != clustering.dimension() {
            return Err(ResolveError::DimensionMismatch {
                filename: artifact.filename,
                expected: clustering.dimension(),
                found: classifier.dimension(),
            });
        }
        classifiers.insert(
            index,
            ResolvedClassifier {
                artifact,
                model: classifier,
            },
        );
    }

    tracing::info!(
        clustering = %clustering_artifact.filename,
        version = %clustering_artifact.published_at,
        clusters = required,
        "resolved model set"
    );

    Ok(ModelSet {
        clustering_version: clustering_artifact.published_at,
        clustering_artifact,
        clustering,
        classifiers,
    })
}

/// The same logical classifier may be republished several times; keep only
/// the most recent artifact per filename.
fn dedup_keep_latest(artifacts: Vec<ArtifactDescriptor>) -> HashMap<String, ArtifactDescriptor> {
    let mut by_filename: HashMap<String, ArtifactDescriptor> = HashMap::new();
    for artifact in artifacts {
        match by_filename.get(&artifact.filename) {
            Some(existing) if existing.published_at >= artifact.published_at => {}
            _ => {
                by_filename.insert(artifact.filename.clone(), artifact);
            }
        }
    }
    by_filename
}

/// Classifier filenames encode their cluster index as a trailing decimal
/// token, e.g. `knn_model_3` -> 3.
fn cluster_index(filename: &str) -> Option<usize> {
    let bytes = filename.as_bytes();
    let mut start = bytes.len();
    while start > 0 && bytes[start - 1].is_ascii_digit() {
        start -= 1;
    }
    if start == bytes.len() {
        return None;
    }
    filename[start..].parse().ok()
}
