//! Authenticated webhook ingress: circuit breaker triggers, intraday
//! breadth prints, put/call ratios, options-flow summaries and pushed
//! factor readings.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bias_core::{factor_config, FactorReading, TimestampSource};
use chrono::Utc;
use circuit_breaker::{ApplyOutcome, ResetOutcome};
use event_bus::BusEvent;
use kv_store::keys;
use serde::Deserialize;

use crate::AppState;

const TICK_TTL_SECS: u64 = 86_400;
const BREADTH_TTL_SECS: u64 = 86_400;
const PCR_TTL_SECS: u64 = 86_400 * 3;
const MARKET_TIDE_TTL_SECS: u64 = 86_400;
const FLOW_TTL_SECS: u64 = 3_600;
const DISCOVERY_TTL_SECS: u64 = 14_400;
const RECENT_FLOW_MAX: isize = 50;

pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/webhook/circuit_breaker", post(receive_circuit_breaker))
        .route("/webhook/circuit_breaker/status", get(circuit_breaker_status))
        .route("/webhook/circuit_breaker/reset", post(reset_circuit_breaker))
        .route("/webhook/circuit_breaker/accept_reset", post(accept_reset))
        .route("/webhook/circuit_breaker/reject_reset", post(reject_reset))
        .route("/webhook/tick", post(receive_tick))
        .route("/webhook/breadth/uvol_dvol", post(receive_uvol_dvol))
        .route("/webhook/pcr", post(receive_pcr))
        .route("/webhook/uw/market_tide", post(receive_market_tide))
        .route("/webhook/uw/flow", post(receive_uw_flow))
        .route("/webhook/uw/discovery", post(receive_uw_discovery))
        .route("/webhook/alerts/pivot", post(receive_pivot_alert))
        .route("/webhook/watchlist/sector-strength", post(receive_sector_strength))
        .route("/webhook/bias/factors/:name", post(receive_factor_reading))
}

// ---------------------------------------------------------------------------
// Circuit breaker
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct BreakerTrigger {
    pub trigger: String,
    #[allow(dead_code)]
    pub timestamp: Option<String>,
}

async fn receive_circuit_breaker(
    State(state): State<AppState>,
    Json(alert): Json<BreakerTrigger>,
) -> (StatusCode, Json<serde_json::Value>) {
    tracing::info!("Circuit breaker webhook received: {}", alert.trigger);

    let outcome = match state.breaker.apply(&alert.trigger).await {
        Ok(outcome) => outcome,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"status": "error", "message": e.to_string()})),
            )
        }
    };

    // Recompute with breaker constraints and broadcast the new state.
    state.engine.compute().await;
    state.bus.publish(BusEvent::CircuitBreaker {
        state: outcome.state().clone(),
        timestamp: Utc::now(),
    });

    let status = match &outcome {
        ApplyOutcome::Applied(_) => "success",
        ApplyOutcome::NoDowngrade(_) => "no_downgrade",
        ApplyOutcome::Cleared(_) => "cleared",
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": status,
            "trigger": alert.trigger,
            "state": outcome.state(),
            "description": outcome.state().description,
        })),
    )
}

async fn circuit_breaker_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "circuit_breaker": state.breaker.state(),
    }))
}

async fn reset_circuit_breaker(State(state): State<AppState>) -> Json<serde_json::Value> {
    let reset_state = state.breaker.reset().await;
    state.engine.compute().await;
    state.bus.publish(BusEvent::CircuitBreaker {
        state: reset_state.clone(),
        timestamp: Utc::now(),
    });
    Json(serde_json::json!({"status": "reset", "state": reset_state}))
}

async fn accept_reset(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.breaker.accept_reset().await {
        ResetOutcome::Accepted { trigger } => {
            state.engine.compute().await;
            state.bus.publish(BusEvent::CircuitBreaker {
                state: state.breaker.state(),
                timestamp: Utc::now(),
            });
            (
                StatusCode::OK,
                Json(serde_json::json!({"status": "accepted", "trigger": trigger})),
            )
        }
        _ => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "status": "no_pending_reset",
                "message": "No circuit breaker is pending reset",
            })),
        ),
    }
}

async fn reject_reset(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.breaker.reject_reset().await {
        ResetOutcome::Rejected { trigger } => {
            state.bus.publish(BusEvent::CircuitBreaker {
                state: state.breaker.state(),
                timestamp: Utc::now(),
            });
            (
                StatusCode::OK,
                Json(serde_json::json!({"status": "rejected", "trigger": trigger})),
            )
        }
        _ => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "status": "no_pending_reset",
                "message": "No circuit breaker is pending reset",
            })),
        ),
    }
}

// ---------------------------------------------------------------------------
// Intraday breadth / sentiment sinks
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TickPayload {
    pub tick_high: f64,
    pub tick_low: f64,
    pub tick_close: Option<f64>,
    pub tick_avg: Option<f64>,
    pub date: Option<String>,
}

async fn receive_tick(
    State(state): State<AppState>,
    Json(payload): Json<TickPayload>,
) -> (StatusCode, Json<serde_json::Value>) {
    let tick_avg = payload
        .tick_avg
        .unwrap_or((payload.tick_high + payload.tick_low) / 2.0);
    let record = serde_json::json!({
        "tick_high": payload.tick_high,
        "tick_low": payload.tick_low,
        "tick_close": payload.tick_close.unwrap_or(tick_avg),
        "tick_avg": tick_avg,
        "date": payload.date,
        "updated_at": Utc::now().to_rfc3339(),
    });

    if let Err(e) = state
        .kv
        .set_json_ex(keys::TICK_CURRENT, &record, TICK_TTL_SECS)
        .await
    {
        return kv_error(e);
    }

    let score =
        factor_engine::tick_breadth::score_tick(tick_avg, payload.tick_high, payload.tick_low);
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "success", "score": score})),
    )
}

#[derive(Deserialize)]
pub struct UvolDvolPayload {
    pub uvol: f64,
    pub dvol: f64,
}

async fn receive_uvol_dvol(
    State(state): State<AppState>,
    Json(payload): Json<UvolDvolPayload>,
) -> (StatusCode, Json<serde_json::Value>) {
    if payload.dvol <= 0.0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"status": "error", "message": "dvol must be positive"})),
        );
    }

    let ratio = payload.uvol / payload.dvol;
    let record = serde_json::json!({
        "uvol": payload.uvol,
        "dvol": payload.dvol,
        "ratio": ratio,
        "updated_at": Utc::now().to_rfc3339(),
    });

    if let Err(e) = state
        .kv
        .set_json_ex(keys::BREADTH_UVOL_DVOL, &record, BREADTH_TTL_SECS)
        .await
    {
        return kv_error(e);
    }

    let score = factor_engine::breadth_intraday::score_breadth_ratio(ratio);
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "success", "ratio": ratio, "score": score})),
    )
}

#[derive(Deserialize)]
pub struct PcrPayload {
    pub pcr: f64,
    pub date: Option<String>,
}

async fn receive_pcr(
    State(state): State<AppState>,
    Json(payload): Json<PcrPayload>,
) -> (StatusCode, Json<serde_json::Value>) {
    if payload.pcr <= 0.0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"status": "error", "message": "pcr must be positive"})),
        );
    }

    let record = serde_json::json!({
        "pcr": payload.pcr,
        "date": payload.date.unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string()),
        "updated_at": Utc::now().to_rfc3339(),
    });

    if let Err(e) = state
        .kv
        .set_json_ex(keys::PCR_CURRENT, &record, PCR_TTL_SECS)
        .await
    {
        return kv_error(e);
    }

    let score = factor_engine::put_call_ratio::score_pcr(payload.pcr);
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "success", "pcr": payload.pcr, "score": score})),
    )
}

async fn receive_market_tide(
    State(state): State<AppState>,
    Json(mut payload): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    if !payload.is_object() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"status": "error", "message": "object body required"})),
        );
    }
    if let Some(map) = payload.as_object_mut() {
        map.entry("updated_at")
            .or_insert_with(|| serde_json::json!(Utc::now().to_rfc3339()));
    }

    if let Err(e) = state
        .kv
        .set_json_ex(keys::MARKET_TIDE, &payload, MARKET_TIDE_TTL_SECS)
        .await
    {
        return kv_error(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "success"})),
    )
}

// ---------------------------------------------------------------------------
// UW flow
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct FlowBody {
    #[serde(default)]
    pub summaries: Vec<serde_json::Value>,
    pub timestamp: Option<String>,
}

async fn receive_uw_flow(
    State(state): State<AppState>,
    Json(body): Json<FlowBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut written = 0usize;
    let mut tickers_updated = Vec::new();

    for summary in &body.summaries {
        let Some(ticker) = summary.get("ticker").and_then(|v| v.as_str()) else {
            continue;
        };
        let ticker = ticker.to_uppercase();

        if let Err(e) = state
            .kv
            .set_json_ex(&keys::uw_flow(&ticker), summary, FLOW_TTL_SECS)
            .await
        {
            tracing::warn!("UW flow cache write failed for {}: {}", ticker, e);
            continue;
        }
        written += 1;
        tickers_updated.push(ticker.clone());

        let get_f64 = |key: &str| summary.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
        let unusual_count = summary
            .get("unusual_count")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        let mut alert_record = serde_json::json!({
            "ticker": ticker,
            "sentiment": summary.get("sentiment").cloned().unwrap_or(serde_json::json!("UNKNOWN")),
            "type": if unusual_count > 2 { "SWEEP" } else { "BLOCK" },
            "premium": get_f64("call_premium") + get_f64("put_premium"),
            "net_premium": get_f64("net_premium"),
            "call_premium": get_f64("call_premium"),
            "put_premium": get_f64("put_premium"),
            "unusual_count": unusual_count,
            "received_at": Utc::now().to_rfc3339(),
            "timestamp": body.timestamp.clone().unwrap_or_else(|| Utc::now().to_rfc3339()),
        });
        if let Some(largest) = summary.get("largest_trade") {
            alert_record["largest_trade"] = largest.clone();
        }

        if let Ok(raw) = serde_json::to_string(&alert_record) {
            let _ = state.kv.lpush(keys::UW_FLOW_RECENT, &raw).await;
        }
    }

    if written > 0 {
        let _ = state.kv.ltrim(keys::UW_FLOW_RECENT, RECENT_FLOW_MAX).await;
        state.bus.publish(BusEvent::FlowUpdate {
            tickers_updated,
            count: written,
            timestamp: Utc::now(),
        });
    }

    tracing::info!("UW flow: cached {} ticker summaries", written);
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "success", "cached": written})),
    )
}

#[derive(Deserialize)]
pub struct DiscoveryBody {
    #[serde(default)]
    pub tickers: Vec<serde_json::Value>,
}

async fn receive_uw_discovery(
    State(state): State<AppState>,
    Json(body): Json<DiscoveryBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Err(e) = state
        .kv
        .set_json_ex(keys::UW_DISCOVERY, &body.tickers, DISCOVERY_TTL_SECS)
        .await
    {
        return kv_error(e);
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "success", "cached": body.tickers.len()})),
    )
}

// ---------------------------------------------------------------------------
// Misc sinks
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct PivotAlert {
    pub title: Option<String>,
    pub message: Option<String>,
    pub severity: Option<String>,
}

async fn receive_pivot_alert(
    State(state): State<AppState>,
    Json(alert): Json<PivotAlert>,
) -> Json<serde_json::Value> {
    let title = alert.title.unwrap_or_else(|| "Pivot alert".to_string());
    let message = alert.message.unwrap_or_default();
    let severity = alert.severity.unwrap_or_else(|| "info".to_string());

    if let Err(e) = state
        .db
        .insert_health_alert(&title, &message, &severity)
        .await
    {
        tracing::warn!("Failed to record pivot alert: {}", e);
    }
    Json(serde_json::json!({"status": "ok"}))
}

#[derive(Deserialize)]
pub struct SectorStrengthBody {
    pub sector_strength: serde_json::Value,
}

async fn receive_sector_strength(
    State(state): State<AppState>,
    Json(body): Json<SectorStrengthBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Err(e) = state
        .kv
        .set_json_ex("watchlist:sector_strength", &body.sector_strength, 86_400)
        .await
    {
        return kv_error(e);
    }
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

// ---------------------------------------------------------------------------
// Pushed factor readings
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct FactorPayload {
    pub score: f64,
    #[serde(default)]
    pub detail: String,
    pub data: Option<serde_json::Value>,
    pub collected_at: Option<String>,
    pub source: Option<String>,
}

async fn receive_factor_reading(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<FactorPayload>,
) -> (StatusCode, Json<serde_json::Value>) {
    if factor_config(&name).is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"status": "error", "message": format!("unknown factor {name}")})),
        );
    }
    if !(-1.0..=1.0).contains(&payload.score) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"status": "error", "message": "score out of [-1, 1]"})),
        );
    }

    let (timestamp, ts_source) = match payload.collected_at.as_deref() {
        Some(raw) => match factor_engine::webhook::parse_timestamp(raw) {
            Some(parsed) => (parsed, TimestampSource::Timestamp),
            None => (Utc::now(), TimestampSource::Fallback),
        },
        None => (Utc::now(), TimestampSource::Fallback),
    };

    let mut reading = FactorReading::new(
        &name,
        payload.score,
        payload.detail,
        timestamp,
        payload.source.as_deref().unwrap_or("pivot"),
    )
    .with_timestamp_source(ts_source);
    if let Some(data) = payload.data {
        reading = reading.with_raw_data(data);
    }

    state.store.store_reading(&reading).await;
    let composite = state.engine.compute().await;

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "success",
            "factor_id": name,
            "score": reading.score,
            "signal": reading.signal,
            "composite_bias": composite.bias_level,
        })),
    )
}

fn kv_error(e: bias_core::BiasError) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"status": "error", "message": e.to_string()})),
    )
}
