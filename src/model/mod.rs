//! Model decoding - turns opaque artifact payloads into runnable models
//!
//! Artifacts are JSON documents carrying a `schema` discriminator. Two
//! schemas are supported: `centroids/1` (inference-only k-means, one
//! centroid per cluster) and `knn/1` (a k-nearest-neighbour fingerprint
//! classifier plus the reference-point coordinate table).
//!
//! Decoding is strict: a model that decodes successfully is guaranteed to
//! be internally consistent, so `predict` never fails at request time.

use std::collections::HashMap;

use serde::Deserialize;

pub const CENTROIDS_SCHEMA: &str = "centroids/1";
pub const KNN_SCHEMA: &str = "knn/1";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed model payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported model schema '{0}'")]
    UnsupportedSchema(String),

    #[error("invalid model payload: {0}")]
    Invalid(String),
}

/// A reference-point position in the site's coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, serde::Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

// ---------------------------------------------------------------------------
// Clustering model
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ClusteringPayload {
    schema: String,
    centroids: Vec<Vec<f64>>,
}

/// Coarse signal-space partitioner: maps an RSSI vector to the index of
/// its nearest centroid.
#[derive(Debug, Clone)]
pub struct ClusteringModel {
    centroids: Vec<Vec<f64>>,
}

impl ClusteringModel {
    pub fn cluster_count(&self) -> usize {
        self.centroids.len()
    }

    /// Number of access points the model was trained against.
    pub fn dimension(&self) -> usize {
        self.centroids[0].len()
    }

    pub fn predict(&self, rssi: &[f64]) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (index, centroid) in self.centroids.iter().enumerate() {
            let dist = squared_distance(centroid, rssi);
            if dist < best_dist {
                best = index;
                best_dist = dist;
            }
        }
        best
    }
}

pub fn decode_clustering(bytes: &[u8]) -> Result<ClusteringModel, DecodeError> {
    let payload: ClusteringPayload = serde_json::from_slice(bytes)?;
    if payload.schema != CENTROIDS_SCHEMA {
        return Err(DecodeError::UnsupportedSchema(payload.schema));
    }
    if payload.centroids.is_empty() {
        return Err(DecodeError::Invalid("no centroids".into()));
    }

    let dimension = payload.centroids[0].len();
    if dimension == 0 {
        return Err(DecodeError::Invalid("zero-dimensional centroids".into()));
    }
    for centroid in &payload.centroids {
        if centroid.len() != dimension {
            return Err(DecodeError::Invalid(format!(
                "ragged centroid matrix: expected dimension {dimension}, found {}",
                centroid.len()
            )));
        }
        if centroid.iter().any(|v| !v.is_finite()) {
            return Err(DecodeError::Invalid("non-finite centroid value".into()));
        }
    }

    Ok(ClusteringModel {
        centroids: payload.centroids,
    })
}

// ---------------------------------------------------------------------------
// Classifier model
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FingerprintSample {
    rssi: Vec<f64>,
    label: String,
}

#[derive(Debug, Deserialize)]
struct ClassifierPayload {
    schema: String,
    k: usize,
    samples: Vec<FingerprintSample>,
    reference_points: HashMap<String, Point>,
}

/// Per-cluster refiner: k-NN over the cluster's fingerprint database,
/// with a label -> coordinates table for the final position lookup.
#[derive(Debug, Clone)]
pub struct ClassifierModel {
    k: usize,
    samples: Vec<(Vec<f64>, String)>,
    positions: HashMap<String, Point>,
}

impl ClassifierModel {
    /// Number of access points the fingerprints were recorded against.
    pub fn dimension(&self) -> usize {
        self.samples[0].0.len()
    }

    /// Majority label among the k nearest fingerprints; ties are broken in
    /// favour of the label holding the single nearest sample.
    pub fn predict(&self, rssi: &[f64]) -> &str {
        let mut scored: Vec<(f64, &str)> = self
            .samples
            .iter()
            .map(|(sample, label)| (squared_distance(sample, rssi), label.as_str()))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let k = self.k.min(scored.len());
        let mut votes: HashMap<&str, (usize, f64)> = HashMap::new();
        for &(dist, label) in &scored[..k] {
            let entry = votes.entry(label).or_insert((0, dist));
            entry.0 += 1;
            if dist < entry.1 {
                entry.1 = dist;
            }
        }

        votes
            .into_iter()
            .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then_with(|| b.1 .1.total_cmp(&a.1 .1)))
            .map(|(label, _)| label)
            .unwrap_or("")
    }

    pub fn position_of(&self, label: &str) -> Option<Point> {
        self.positions.get(label).copied()
    }
}

pub fn decode_classifier(bytes: &[u8]) -> Result<ClassifierModel, DecodeError> {
    let payload: ClassifierPayload = serde_json::from_slice(bytes)?;
    if payload.schema != KNN_SCHEMA {
        return Err(DecodeError::UnsupportedSchema(payload.schema));
    }
    if payload.k == 0 {
        return Err(DecodeError::Invalid("k must be at least 1".into()));
    }
    if payload.samples.is_empty() {
        return Err(DecodeError::Invalid("no fingerprint samples".into()));
    }

    let dimension = payload.samples[0].rssi.len();
    if dimension == 0 {
        return Err(DecodeError::Invalid("zero-dimensional samples".into()));
    }
    for sample in &payload.samples {
        if sample.rssi.len() != dimension {
            return Err(DecodeError::Invalid(format!(
                "ragged sample matrix: expected dimension {dimension}, found {}",
                sample.rssi.len()
            )));
        }
        if sample.rssi.iter().any(|v| !v.is_finite()) {
            return Err(DecodeError::Invalid("non-finite sample value".into()));
        }
        if !payload.reference_points.contains_key(&sample.label) {
            return Err(DecodeError::Invalid(format!(
                "sample label '{}' has no reference point",
                sample.label
            )));
        }
    }
    for (label, point) in &payload.reference_points {
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(DecodeError::Invalid(format!(
                "reference point '{label}' has non-finite coordinates"
            )));
        }
    }

    Ok(ClassifierModel {
        k: payload.k,
        samples: payload
            .samples
            .into_iter()
            .map(|s| (s.rssi, s.label))
            .collect(),
        positions: payload.reference_points,
    })
}

/// Squared Euclidean distance over the shared prefix of the two vectors.
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clustering_bytes(centroids: serde_json::Value) -> Vec<u8> {
        json!({ "schema": CENTROIDS_SCHEMA, "centroids": centroids })
            .to_string()
            .into_bytes()
    }

    #[test]
    fn decodes_clustering_and_predicts_nearest_centroid() {
        let bytes = clustering_bytes(json!([[-40.0, -70.0], [-70.0, -40.0]]));
        let model = decode_clustering(&bytes).unwrap();

        assert_eq!(model.cluster_count(), 2);
        assert_eq!(model.dimension(), 2);
        assert_eq!(model.predict(&[-42.0, -68.0]), 0);
        assert_eq!(model.predict(&[-71.0, -39.0]), 1);
    }

    #[test]
    fn rejects_unknown_clustering_schema() {
        let bytes = json!({ "schema": "centroids/9", "centroids": [[1.0]] })
            .to_string()
            .into_bytes();
        assert!(matches!(
            decode_clustering(&bytes),
            Err(DecodeError::UnsupportedSchema(_))
        ));
    }

    #[test]
    fn rejects_ragged_centroid_matrix() {
        let bytes = clustering_bytes(json!([[-40.0, -70.0], [-70.0]]));
        assert!(matches!(
            decode_clustering(&bytes),
            Err(DecodeError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_truncated_payload() {
        let bytes = b"{\"schema\":\"centroids/1\",\"cent";
        assert!(matches!(
            decode_clustering(bytes),
            Err(DecodeError::Malformed(_))
        ));
    }

    fn classifier_bytes() -> Vec<u8> {
        json!({
            "schema": KNN_SCHEMA,
            "k": 3,
            "samples": [
                { "rssi": [-40.0, -70.0], "label": "RP_1" },
                { "rssi": [-41.0, -69.0], "label": "RP_1" },
                { "rssi": [-60.0, -50.0], "label": "RP_2" },
            ],
            "reference_points": {
                "RP_1": { "x": 1.5, "y": 2.0 },
                "RP_2": { "x": 8.0, "y": 3.5 },
            },
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn classifier_votes_by_majority() {
        let model = decode_classifier(&classifier_bytes()).unwrap();

        // Two of the three nearest samples carry RP_1.
        let label = model.predict(&[-42.0, -68.0]);
        assert_eq!(label, "RP_1");
        assert_eq!(model.position_of(label), Some(Point { x: 1.5, y: 2.0 }));
    }

    #[test]
    fn classifier_breaks_ties_with_nearest_sample() {
        let bytes = json!({
            "schema": KNN_SCHEMA,
            "k": 2,
            "samples": [
                { "rssi": [0.0], "label": "near" },
                { "rssi": [10.0], "label": "far" },
            ],
            "reference_points": {
                "near": { "x": 0.0, "y": 0.0 },
                "far": { "x": 1.0, "y": 1.0 },
            },
        })
        .to_string()
        .into_bytes();
        let model = decode_classifier(&bytes).unwrap();

        // One vote each; the label with the closer sample wins.
        assert_eq!(model.predict(&[1.0]), "near");
        assert_eq!(model.predict(&[9.0]), "far");
    }

    #[test]
    fn rejects_sample_without_reference_point() {
        let bytes = json!({
            "schema": KNN_SCHEMA,
            "k": 1,
            "samples": [{ "rssi": [-40.0], "label": "RP_9" }],
            "reference_points": {},
        })
        .to_string()
        .into_bytes();
        assert!(matches!(
            decode_classifier(&bytes),
            Err(DecodeError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_zero_k() {
        let bytes = json!({
            "schema": KNN_SCHEMA,
            "k": 0,
            "samples": [{ "rssi": [-40.0], "label": "RP_1" }],
            "reference_points": { "RP_1": { "x": 0.0, "y": 0.0 } },
        })
        .to_string()
        .into_bytes();
        assert!(matches!(
            decode_classifier(&bytes),
            Err(DecodeError::Invalid(_))
        ));
    }
}
