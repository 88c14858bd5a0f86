//! Composite bias endpoints: current composite, manual recompute, factor
//! snapshot and operator override management.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use bias_core::BiasLevel;
use serde::Deserialize;

use crate::{ApiResponse, AppState};

pub fn bias_routes() -> Router<AppState> {
    Router::new()
        .route("/api/bias/composite", get(get_composite))
        .route("/api/bias/compute", post(compute_composite))
        .route("/api/bias/factors", get(get_factors))
        .route("/api/bias/override", post(set_override))
        .route("/api/bias/override", delete(clear_override))
        .route("/api/bias/breadth", get(get_breadth))
}

async fn get_composite(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    let result = state.engine.get_or_compute().await;
    Json(ApiResponse::success(
        serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
    ))
}

async fn compute_composite(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    let result = state.engine.compute().await;
    Json(ApiResponse::success(
        serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
    ))
}

async fn get_factors(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    let snapshot = state.engine.factor_snapshot().await;
    let factors: serde_json::Map<String, serde_json::Value> = snapshot
        .into_iter()
        .map(|(id, reading)| {
            (
                id,
                serde_json::to_value(reading).unwrap_or(serde_json::Value::Null),
            )
        })
        .collect();
    Json(ApiResponse::success(serde_json::Value::Object(factors)))
}

#[derive(Deserialize)]
pub struct OverrideRequest {
    pub level: String,
    pub reason: Option<String>,
    pub expires_hours: Option<i64>,
}

async fn set_override(
    State(state): State<AppState>,
    Json(request): Json<OverrideRequest>,
) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    let level: BiasLevel = match request.level.parse() {
        Ok(level) => level,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    };

    match state
        .engine
        .set_override(level, request.reason, request.expires_hours)
        .await
    {
        Ok(payload) => {
            // Recompute so the override is reflected immediately.
            state.engine.compute().await;
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
                )),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

async fn clear_override(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    state.engine.clear_override(Some("operator_cleared")).await;
    state.engine.compute().await;
    Json(ApiResponse::success(serde_json::json!({"cleared": true})))
}

async fn get_breadth(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    // Scored UVOL/DVOL reading; not part of the composite's closed set.
    let reading = factor_engine::breadth_intraday::compute(&state.store).await;
    Json(ApiResponse::success(
        serde_json::to_value(reading).unwrap_or(serde_json::Value::Null),
    ))
}
