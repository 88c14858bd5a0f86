//! Signal, watchlist, scheduler-status and committee-context endpoints.

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::{ApiResponse, AppState};

pub fn signal_routes() -> Router<AppState> {
    Router::new()
        .route("/api/signals/recent", get(recent_signals))
        .route("/api/scan", post(run_scan))
        .route("/api/watchlist", get(get_watchlist))
        .route("/api/watchlist", post(add_watchlist))
        .route("/api/watchlist/:symbol", delete(remove_watchlist))
        .route("/api/scheduler/status", get(scheduler_status))
        .route("/api/committee/context", get(committee_context))
}

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

async fn recent_signals(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Json<ApiResponse<Vec<serde_json::Value>>> {
    match state.db.recent_signals(query.limit.unwrap_or(50)).await {
        Ok(signals) => Json(ApiResponse::success(signals)),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

async fn run_scan(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    let signals = state.scanner.scan().await;
    let found = signals.len();
    let dispatched = state.dispatcher.dispatch_all(signals).await;
    Json(ApiResponse::success(serde_json::json!({
        "signals_found": found,
        "dispatched": dispatched.len(),
        "signals": dispatched,
    })))
}

async fn get_watchlist(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<bias_db::WatchlistEntry>>> {
    match state.db.watchlist().await {
        Ok(entries) => Json(ApiResponse::success(entries)),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

#[derive(Deserialize)]
pub struct WatchlistAdd {
    pub symbol: String,
    pub sector: Option<String>,
}

async fn add_watchlist(
    State(state): State<AppState>,
    Json(request): Json<WatchlistAdd>,
) -> Json<ApiResponse<serde_json::Value>> {
    match state
        .db
        .add_watchlist_ticker(&request.symbol, request.sector.as_deref())
        .await
    {
        Ok(()) => Json(ApiResponse::success(
            serde_json::json!({"symbol": request.symbol.to_uppercase()}),
        )),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

async fn remove_watchlist(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Json<ApiResponse<serde_json::Value>> {
    match state.db.remove_watchlist_ticker(&symbol).await {
        Ok(()) => Json(ApiResponse::success(
            serde_json::json!({"removed": symbol.to_uppercase()}),
        )),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

async fn scheduler_status(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    use bias_scheduler::market_hours;

    let now_et = market_hours::eastern_now();
    let mut snapshot = state.scheduler_status.snapshot();
    if let Some(map) = snapshot.as_object_mut() {
        map.insert(
            "current_time_et".to_string(),
            serde_json::json!(now_et.format("%Y-%m-%d %H:%M:%S").to_string()),
        );
        map.insert(
            "is_trading_day".to_string(),
            serde_json::json!(market_hours::is_trading_day(&now_et)),
        );
        map.insert(
            "is_market_hours".to_string(),
            serde_json::json!(market_hours::is_market_hours(&now_et)),
        );
        let cta_interval = if market_hours::is_market_hours(&now_et) {
            format!(
                "{} min",
                market_hours::scanner_interval_minutes(&now_et)
            )
        } else {
            "paused (after hours)".to_string()
        };
        map.insert("cta_interval".to_string(), serde_json::json!(cta_interval));
    }
    Json(ApiResponse::success(snapshot))
}

async fn committee_context(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    let packet = state.assembler.build_packet(None).await;
    Json(ApiResponse::success(
        serde_json::to_value(packet).unwrap_or(serde_json::Value::Null),
    ))
}
