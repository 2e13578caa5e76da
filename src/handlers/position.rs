//! Position estimation handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::orchestrator;
use crate::{AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub rssi: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    pub position: PositionBody,
}

#[derive(Debug, Serialize)]
pub struct PositionBody {
    pub x: f64,
    pub y: f64,
    pub rp: String,
}

/// Estimate the position for one RSSI reading.
///
/// The vector must list signal strengths in the fixed access-point order
/// the deployed models were trained on.
pub async fn locate(
    State(state): State<AppState>,
    Json(req): Json<PositionRequest>,
) -> AppResult<Json<PositionResponse>> {
    let result = orchestrator::predict_position(&state.cache, &req.rssi).await?;

    Ok(Json(PositionResponse {
        position: PositionBody {
            x: result.x,
            y: result.y,
            rp: result.reference_point,
        },
    }))
}
