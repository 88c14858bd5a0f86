//! HTTP surface and process wiring for the bias decision engine.

use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use axum::{Json, Router};
use bias_core::{
    EconomicDataProvider, MarketDataProvider, OptionsDataProvider,
};
use bias_db::BiasDb;
use bias_scheduler::{Scheduler, SchedulerStatus};
use chrono::Utc;
use circuit_breaker::{CircuitBreaker, ConditionVerifier, MarketVerifier};
use committee_context::ContextAssembler;
use composite_engine::CompositeEngine;
use cta_scanner::{Scanner, ScannerConfig};
use event_bus::EventBus;
use factor_engine::{build_registry, IngestorContext, SavitaSetting};
use factor_store::FactorStore;
use kv_store::KvStore;
use market_data::{FredClient, YahooClient, YahooOptionsClient};
use notification_service::{AlertSeverity, Notifier};
use serde::Serialize;
use signal_dispatcher::SignalDispatcher;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod bias_routes;
mod config;
mod signal_routes;
mod webhook_routes;
mod ws_routes;

pub use config::EngineConfig;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CompositeEngine>,
    pub breaker: Arc<CircuitBreaker>,
    pub kv: KvStore,
    pub db: BiasDb,
    pub store: FactorStore,
    pub bus: EventBus,
    pub scanner: Arc<Scanner>,
    pub dispatcher: Arc<SignalDispatcher>,
    pub scheduler_status: Arc<SchedulerStatus>,
    pub assembler: Arc<ContextAssembler>,
    pub api_token: Option<String>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "timestamp": Utc::now().to_rfc3339()}))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received, stopping server");
}

pub async fn run_server() -> Result<()> {
    let config = EngineConfig::from_env()?;
    bias_core::validate_factor_table()
        .map_err(|e| anyhow::anyhow!("factor table invalid: {e}"))?;

    // Stores
    let kv = KvStore::connect(&config.redis_url).await?;
    tracing::info!("Connected to KV store at {}", config.redis_url);
    let db = BiasDb::new(&config.database_url).await?;
    tracing::info!("Relational store ready ({})", config.database_url);

    // Providers behind DI seams
    let market: Arc<dyn MarketDataProvider> =
        Arc::new(YahooClient::new()?.with_cache(kv.clone()));
    let econ: Option<Arc<dyn EconomicDataProvider>> = match &config.fred_api_key {
        Some(key) => Some(Arc::new(FredClient::new(key.clone())?)),
        None => {
            tracing::warn!("FRED_API_KEY not set; economic factors run on snapshots only");
            None
        }
    };
    let options: Option<Arc<dyn OptionsDataProvider>> = Some(Arc::new(YahooOptionsClient::new()?));

    let store = FactorStore::new(kv.clone(), db.clone());
    let notifier = Arc::new(Notifier::new(config.discord_webhook_url.clone()));

    // Circuit breaker: restore persisted state across restarts
    let breaker = Arc::new(CircuitBreaker::new(Some(kv.clone())));
    if breaker.restore().await {
        tracing::info!("Circuit breaker state restored from KV");
    }
    let verifier: Arc<dyn ConditionVerifier> = Arc::new(MarketVerifier::new(market.clone()));

    let bus = EventBus::new();
    let engine = Arc::new(CompositeEngine::new(
        store.clone(),
        kv.clone(),
        db.clone(),
        breaker.clone(),
        verifier,
        bus.clone(),
        notifier.clone(),
    ));

    // Factor ingestors
    let savita = config.savita_reading.map(|reading| SavitaSetting {
        reading,
        as_of: config.savita_date.unwrap_or_else(Utc::now),
    });
    let ingestor_ctx = Arc::new(IngestorContext {
        market: market.clone(),
        econ,
        options,
        store: store.clone(),
        savita,
    });
    let registry = build_registry(ingestor_ctx);
    tracing::info!("Factor registry ready ({} ingestors)", registry.len());

    // Scanner + dispatcher
    let scanner = Arc::new(Scanner::new(
        market.clone(),
        db.clone(),
        kv.clone(),
        ScannerConfig {
            cooldown_minutes: config.scanner_cooldown_minutes,
            ..Default::default()
        },
    ));
    let assembler = Arc::new(ContextAssembler::new(
        market.clone(),
        db.clone(),
        kv.clone(),
    ));
    let dispatcher = Arc::new(
        SignalDispatcher::new(db.clone(), kv.clone(), bus.clone())
            .with_assembler(assembler.clone())
            .with_cooldown_minutes(config.scanner_cooldown_minutes),
    );

    // Scheduler drivers
    let scheduler_status = Arc::new(SchedulerStatus::new());
    let scheduler = Arc::new(Scheduler::new(
        engine.clone(),
        registry,
        store.clone(),
        scanner.clone(),
        dispatcher.clone(),
        market.clone(),
        db.clone(),
        scheduler_status.clone(),
    ));
    let driver_handles = scheduler.spawn();
    tracing::info!("Scheduler started ({} drivers)", driver_handles.len());

    notifier
        .send_now(
            "BiasDesk started",
            "Bias engine, scanner and webhook intake are live.",
            AlertSeverity::Info,
        )
        .await;

    let state = AppState {
        engine,
        breaker,
        kv,
        db,
        store,
        bus,
        scanner,
        dispatcher,
        scheduler_status,
        assembler,
        api_token: config.api_token.clone(),
    };

    let webhooks = webhook_routes::webhook_routes().route_layer(
        axum::middleware::from_fn_with_state(state.clone(), auth::require_bearer),
    );

    let app = Router::new()
        .merge(webhooks)
        .merge(bias_routes::bias_routes())
        .merge(signal_routes::signal_routes())
        .merge(ws_routes::ws_routes())
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("BiasDesk API listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for handle in driver_handles {
        handle.abort();
    }
    tracing::info!("BiasDesk shut down.");
    Ok(())
}
