//! Authentication handlers
//!
//! A single operator account, configured through the environment, may
//! manage model artifacts. Login issues a short-lived JWT.

use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Operator username
    pub exp: usize,  // Expiration timestamp
    pub iat: usize,  // Issued at
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
}

/// Login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if !credentials_match(&req.username, &state.config.operator_username)
        || !credentials_match(&req.password, &state.config.operator_password)
    {
        return Err(AppError::InvalidCredentials);
    }

    let token = generate_jwt(&req.username, &state.config)?;

    tracing::info!("Operator '{}' logged in", req.username);

    Ok(Json(LoginResponse {
        access_token: token,
    }))
}

/// Compare credentials via fixed-length digests so the comparison time does
/// not depend on where the strings diverge.
fn credentials_match(provided: &str, expected: &str) -> bool {
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// Generate JWT token
fn generate_jwt(username: &str, config: &Config) -> AppResult<String> {
    let now = Utc::now();
    let exp = now + Duration::minutes(config.jwt_expiration_minutes as i64);

    let claims = Claims {
        sub: username.to_string(),
        exp: exp.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(e.to_string()))
}
