//! Cadenced drivers for the whole engine: factor refresh loops, scanner
//! cycles, outcome tracking and the health heartbeat. Each driver is an
//! independent cooperative task with per-task status for observability.
//! A missed tick does not queue; the next tick runs fresh.

use std::sync::Arc;

use bias_core::{factor_ids_for, Direction, FactorTimeframe, MarketDataProvider};
use bias_db::BiasDb;
use chrono::{DateTime, NaiveDate, Utc};
use composite_engine::CompositeEngine;
use cta_scanner::Scanner;
use factor_engine::{registry_subset, FactorIngestor};
use factor_store::FactorStore;
use signal_dispatcher::SignalDispatcher;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration as TokioDuration, MissedTickBehavior};

pub mod market_hours;
pub mod outcome_tracker;
pub mod status;

pub use outcome_tracker::{match_outcome, OutcomeMatch, MAX_BARS_HELD};
pub use status::{SchedulerStatus, TaskStatus};

/// Symbols the 24/7 crypto scanner cycles over.
pub const CRYPTO_UNIVERSE: &[&str] = &["BTC-USD", "ETH-USD", "SOL-USD"];

/// Composite older than this is reported as stale by the heartbeat.
pub const OFFLINE_THRESHOLD_MINUTES: i64 = 30;

pub struct Scheduler {
    engine: Arc<CompositeEngine>,
    registry: Vec<Arc<dyn FactorIngestor>>,
    store: FactorStore,
    scanner: Arc<Scanner>,
    dispatcher: Arc<SignalDispatcher>,
    market: Arc<dyn MarketDataProvider>,
    db: BiasDb,
    status: Arc<SchedulerStatus>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<CompositeEngine>,
        registry: Vec<Arc<dyn FactorIngestor>>,
        store: FactorStore,
        scanner: Arc<Scanner>,
        dispatcher: Arc<SignalDispatcher>,
        market: Arc<dyn MarketDataProvider>,
        db: BiasDb,
        status: Arc<SchedulerStatus>,
    ) -> Self {
        Self {
            engine,
            registry,
            store,
            scanner,
            dispatcher,
            market,
            db,
            status,
        }
    }

    pub fn status(&self) -> Arc<SchedulerStatus> {
        self.status.clone()
    }

    /// Spawn every driver. Handles can be aborted for shutdown; tasks
    /// interrupt at their next suspension point.
    pub fn spawn(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        self.status.mark_started();
        self.status
            .register("factor_refresh_intraday", "5 min (market hours)");
        self.status
            .register("factor_refresh_daily", "09:45 ET (trading days)");
        self.status
            .register("cta_scanner", "15-30 min (market hours)");
        self.status.register("crypto_scanner", "30 min (24/7)");
        self.status.register("outcome_tracker", "hourly");
        self.status.register("health_heartbeat", "5 min");

        vec![
            tokio::spawn(self.clone().intraday_refresh_loop()),
            tokio::spawn(self.clone().daily_refresh_loop()),
            tokio::spawn(self.clone().scanner_loop()),
            tokio::spawn(self.clone().crypto_scanner_loop()),
            tokio::spawn(self.clone().outcome_tracker_loop()),
            tokio::spawn(self.heartbeat_loop()),
        ]
    }

    async fn refresh_factors(&self, ids: &[&str]) -> usize {
        let subset = registry_subset(&self.registry, ids);
        let mut refreshed = 0;
        for ingestor in subset {
            if let Some(reading) = ingestor.compute().await {
                self.store.store_reading(&reading).await;
                refreshed += 1;
            }
        }
        // Recompute with the fresh readings (debounced by the 15 s cache
        // for readers; the write path always recomputes).
        self.engine.compute().await;
        refreshed
    }

    async fn intraday_refresh_loop(self: Arc<Self>) {
        let mut ticker = interval(TokioDuration::from_secs(300));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let now_et = market_hours::eastern_now();
            if !market_hours::is_market_hours(&now_et) {
                continue;
            }
            self.status.mark_running("factor_refresh_intraday");
            let ids = factor_ids_for(FactorTimeframe::Intraday);
            let refreshed = self.refresh_factors(&ids).await;
            self.status.mark_completed(
                "factor_refresh_intraday",
                Some(format!("{refreshed}/{} factors", ids.len())),
            );
        }
    }

    async fn daily_refresh_loop(self: Arc<Self>) {
        let mut ticker = interval(TokioDuration::from_secs(60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_run_date: Option<NaiveDate> = None;
        loop {
            ticker.tick().await;
            let now_et = market_hours::eastern_now();
            if !market_hours::is_daily_refresh_window(&now_et) {
                continue;
            }
            let today = now_et.date_naive();
            if last_run_date == Some(today) {
                continue;
            }
            last_run_date = Some(today);

            self.status.mark_running("factor_refresh_daily");
            let mut ids = factor_ids_for(FactorTimeframe::Swing);
            ids.extend(factor_ids_for(FactorTimeframe::Macro));
            let refreshed = self.refresh_factors(&ids).await;
            self.status.mark_completed(
                "factor_refresh_daily",
                Some(format!("{refreshed}/{} factors", ids.len())),
            );
        }
    }

    async fn scanner_loop(self: Arc<Self>) {
        let mut ticker = interval(TokioDuration::from_secs(60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_run: Option<DateTime<Utc>> = None;
        loop {
            ticker.tick().await;
            let now_et = market_hours::eastern_now();
            if !market_hours::is_market_hours(&now_et) {
                continue;
            }
            let cadence = market_hours::scanner_interval_minutes(&now_et);
            if let Some(last) = last_run {
                if Utc::now() - last < chrono::Duration::minutes(cadence) {
                    continue;
                }
            }
            last_run = Some(Utc::now());

            self.status.mark_running("cta_scanner");
            let signals = self.scanner.scan().await;
            let found = signals.len();
            let dispatched = self.dispatcher.dispatch_all(signals).await.len();
            self.status.mark_completed(
                "cta_scanner",
                Some(format!("{found} signals found, {dispatched} dispatched")),
            );
        }
    }

    async fn crypto_scanner_loop(self: Arc<Self>) {
        let mut ticker = interval(TokioDuration::from_secs(1800));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.status.mark_running("crypto_scanner");
            let mut found = 0;
            for symbol in CRYPTO_UNIVERSE {
                let signals = self.scanner.scan_symbol(symbol).await;
                found += signals.len();
                self.dispatcher.dispatch_all(signals).await;
            }
            self.status
                .mark_completed("crypto_scanner", Some(format!("{found} signals")));
        }
    }

    async fn outcome_tracker_loop(self: Arc<Self>) {
        let mut ticker = interval(TokioDuration::from_secs(3600));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.status.mark_running("outcome_tracker");
            match self.track_outcomes().await {
                Ok(closed) => self
                    .status
                    .mark_completed("outcome_tracker", Some(format!("{closed} closed"))),
                Err(e) => self.status.mark_error("outcome_tracker", e.to_string()),
            }
        }
    }

    /// Walk open signals and close any whose stop/target has been hit.
    pub async fn track_outcomes(&self) -> Result<usize, bias_core::BiasError> {
        let open = self.db.open_signals().await?;
        let mut closed = 0;

        for row in open {
            let Ok(direction) = row.direction.parse::<Direction>() else {
                continue;
            };
            let Ok(created_at) = DateTime::parse_from_rfc3339(&row.created_at) else {
                continue;
            };
            let created_at = created_at.with_timezone(&Utc);

            let days_open = (Utc::now() - created_at).num_days().max(1) + 1;
            let bars = match self.market.daily_bars(&row.symbol, days_open).await {
                Ok(bars) => bars,
                Err(e) => {
                    tracing::debug!("Outcome tracker: bars for {} failed: {}", row.symbol, e);
                    continue;
                }
            };

            let since_emission: Vec<_> = bars
                .into_iter()
                .filter(|b| b.timestamp > created_at)
                .collect();
            if since_emission.is_empty() {
                continue;
            }

            if let Some(matched) = match_outcome(
                direction,
                row.entry,
                row.stop,
                row.t1,
                row.t2,
                &since_emission,
            ) {
                self.db
                    .close_signal(
                        &row.signal_id,
                        matched.outcome,
                        Some(matched.exit_price),
                        Some(matched.bars_held as i64),
                        Some(matched.pnl_r),
                    )
                    .await?;
                tracing::info!(
                    "Outcome: {} {} closed {} at {:.2} ({:+.1}R)",
                    row.symbol,
                    row.signal_type,
                    matched.outcome.as_str(),
                    matched.exit_price,
                    matched.pnl_r
                );
                closed += 1;
            }
        }

        Ok(closed)
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let mut ticker = interval(TokioDuration::from_secs(300));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.status.mark_running("health_heartbeat");

            let composite = self.engine.get_cached().await;
            let (health, detail) = match &composite {
                Some(c) => {
                    let age_min = (Utc::now() - c.timestamp).num_minutes();
                    let health = if age_min > OFFLINE_THRESHOLD_MINUTES {
                        "stale"
                    } else {
                        "ok"
                    };
                    (
                        health,
                        format!(
                            "bias {} ({} active / {} stale, computed {}m ago)",
                            c.bias_level,
                            c.active_factors.len(),
                            c.stale_factors.len(),
                            age_min
                        ),
                    )
                }
                None => ("offline", "no composite yet".to_string()),
            };

            if let Err(e) = self
                .db
                .record_health("bias_engine", health, Some(detail.as_str()))
                .await
            {
                tracing::warn!("Heartbeat: health record failed: {}", e);
            }

            self.status
                .mark_completed("health_heartbeat", Some(detail));
        }
    }
}
