//! Error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::orchestrator::PredictError;
use crate::resolver::ResolveError;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Auth errors
    InvalidCredentials,
    TokenInvalid,
    Unauthorized,

    // Request errors
    BadRequest(String),
    NotFound(String),

    // Positioning pipeline errors
    /// No clustering model has ever been published.
    NotConfigured,
    /// Classifier coverage does not match the active clustering model.
    MissingClusterConfig(String),
    /// A model could not be materialized (corrupt artifact, set gap,
    /// unreachable store).
    ModelUnavailable(String),

    // Database errors
    DatabaseError(String),

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid username or password")
            }
            AppError::TokenInvalid => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            AppError::NotConfigured => (
                StatusCode::NOT_FOUND,
                "Positioning service not configured: no clustering model published",
            ),
            AppError::MissingClusterConfig(msg) => {
                tracing::error!("Inconsistent model set: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg.as_str())
            }
            AppError::ModelUnavailable(msg) => {
                tracing::error!("Positioning service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Positioning service unavailable",
                )
            }
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::Database(e) => AppError::DatabaseError(e.to_string()),
            StoreError::MissingPayload(_) => AppError::ModelUnavailable(err.to_string()),
        }
    }
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound => AppError::NotConfigured,
            ResolveError::Inconsistent { .. } => AppError::MissingClusterConfig(err.to_string()),
            ResolveError::Decode { .. } | ResolveError::DimensionMismatch { .. } => {
                AppError::ModelUnavailable(err.to_string())
            }
            ResolveError::Store(e) => AppError::ModelUnavailable(e.to_string()),
        }
    }
}

impl From<PredictError> for AppError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::InvalidInput(_) => AppError::BadRequest(err.to_string()),
            PredictError::NoMatchingClassifier(_) | PredictError::UnknownReferencePoint { .. } => {
                AppError::ModelUnavailable(err.to_string())
            }
            PredictError::Resolve(e) => e.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AppError::TokenInvalid
    }
}
