//! Authentication middleware

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::handlers::auth::Claims;
use crate::{AppError, AppState};

/// Operator context extracted from a valid JWT
#[derive(Debug, Clone)]
pub struct OperatorContext {
    pub username: String,
}

/// Middleware: Require operator JWT authentication
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&req)?;

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    let operator = OperatorContext {
        username: token_data.claims.sub,
    };

    req.extensions_mut().insert(operator);

    Ok(next.run(req).await)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(req: &Request) -> Result<String, AppError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;

    if !auth_header.starts_with("Bearer ") {
        return Err(AppError::Unauthorized);
    }

    Ok(auth_header[7..].to_string())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for OperatorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OperatorContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
