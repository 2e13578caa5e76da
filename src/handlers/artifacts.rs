//! Model artifact management handlers
//!
//! Upload, inspect, download, and delete published model artifacts, plus a
//! view of the currently resolved model set.

use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::middleware::auth::OperatorContext;
use crate::store::postgres::NewArtifact;
use crate::store::{ArtifactCategory, ArtifactDescriptor, ArtifactStore};
use crate::{AppError, AppResult, AppState};

/// Upload a new model artifact.
///
/// Multipart fields: `file` (payload bytes), `name`, `category`
/// (`clustering` | `classifier`), `timestamp` (RFC 3339 publish time).
pub async fn upload(
    State(state): State<AppState>,
    operator: OperatorContext,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ArtifactDescriptor>)> {
    let mut payload: Option<Vec<u8>> = None;
    let mut name: Option<String> = None;
    let mut category: Option<ArtifactCategory> = None;
    let mut published_at: Option<DateTime<Utc>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart request: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;
                payload = Some(bytes.to_vec());
            }
            "name" => name = Some(read_text(field).await?),
            "category" => {
                let value = read_text(field).await?;
                category = Some(ArtifactCategory::parse(&value).ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "Invalid category '{value}': expected 'clustering' or 'classifier'"
                    ))
                })?);
            }
            "timestamp" => {
                let value = read_text(field).await?;
                let parsed = DateTime::parse_from_rfc3339(&value).map_err(|_| {
                    AppError::BadRequest(
                        "Invalid timestamp format. Use RFC 3339, e.g. '2025-06-01T12:00:00Z'"
                            .to_string(),
                    )
                })?;
                published_at = Some(parsed.with_timezone(&Utc));
            }
            other => {
                tracing::debug!("Ignoring unknown multipart field '{}'", other);
            }
        }
    }

    let payload = payload.ok_or_else(|| AppError::BadRequest("No file part in the request".into()))?;
    let (name, category, published_at) = match (name, category, published_at) {
        (Some(n), Some(c), Some(t)) => (n, c, t),
        _ => {
            return Err(AppError::BadRequest(
                "Missing required metadata (name, category, timestamp)".into(),
            ))
        }
    };

    let descriptor = state
        .store
        .insert(
            NewArtifact {
                filename: name,
                category,
                published_at,
            },
            &payload,
        )
        .await?;

    tracing::info!(
        "Artifact '{}' ({}) published at {} by '{}' ({} bytes)",
        descriptor.filename,
        descriptor.category,
        descriptor.published_at,
        operator.username,
        descriptor.size_bytes
    );

    Ok((StatusCode::CREATED, Json(descriptor)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart field: {e}")))
}

/// List metadata of every published artifact, newest first.
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<ArtifactDescriptor>>> {
    let artifacts = state.store.list().await?;
    Ok(Json(artifacts))
}

/// Metadata of a single artifact.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ArtifactDescriptor>> {
    let descriptor = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Artifact {id} not found")))?;
    Ok(Json(descriptor))
}

/// Download an artifact's payload bytes.
pub async fn download(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    let descriptor = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Artifact {id} not found")))?;

    let payload = state.store.read_payload(&descriptor).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", descriptor.filename),
        ),
    ];

    Ok((headers, payload).into_response())
}

/// Delete an artifact. Administrative escape hatch; the resolver treats
/// artifacts as immutable otherwise.
pub async fn delete(
    State(state): State<AppState>,
    operator: OperatorContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    if !state.store.delete(id).await? {
        return Err(AppError::NotFound(format!("Artifact {id} not found")));
    }

    tracing::info!("Artifact {} deleted by '{}'", id, operator.username);

    Ok(Json(json!({ "message": "Artifact deleted successfully" })))
}

#[derive(Debug, Serialize)]
pub struct ActiveArtifact {
    pub filename: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ActiveModelsResponse {
    pub clustering: ActiveArtifact,
    pub classifiers: BTreeMap<usize, ActiveArtifact>,
}

/// The currently resolved model set: the active clustering artifact and
/// the classifier chosen for each of its clusters.
pub async fn active(State(state): State<AppState>) -> AppResult<Json<ActiveModelsResponse>> {
    let set = state.cache.get_current().await?;

    let classifiers = set
        .classifiers
        .iter()
        .map(|(index, resolved)| {
            (
                *index,
                ActiveArtifact {
                    filename: resolved.artifact.filename.clone(),
                    published_at: resolved.artifact.published_at,
                },
            )
        })
        .collect();

    Ok(Json(ActiveModelsResponse {
        clustering: ActiveArtifact {
            filename: set.clustering_artifact.filename.clone(),
            published_at: set.clustering_artifact.published_at,
        },
        classifiers,
    }))
}
