//! Composite bias engine: fuses non-stale factor readings into a single
//! directional bias with confidence, applies the operator override and the
//! circuit breaker projection, caches and persists the result, and emits
//! change events and alerts.

use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use bias_core::{factor_ids, BiasError, BiasLevel, BiasOverride, CompositeResult, FactorReading};
use bias_db::BiasDb;
use chrono::{Duration, Timelike, Utc};
use circuit_breaker::{CircuitBreaker, ConditionVerifier, DecayStatus};
use event_bus::{BiasUpdatePayload, BusEvent, EventBus};
use factor_store::FactorStore;
use kv_store::{keys, KvStore};
use notification_service::{AlertSeverity, Notifier};
use tokio::sync::RwLock;

mod evaluate;

pub use evaluate::{evaluate, EvaluateInput, EvaluateOutput, VELOCITY_MULTIPLIER, VELOCITY_SHIFT_COUNT};

/// Short in-process cache to absorb frequent polling between recomputes.
pub const COMPOSITE_MEM_CACHE_TTL_SECS: u64 = 15;

/// Durable cache TTL for the latest composite.
pub const COMPOSITE_KV_TTL_SECS: u64 = 86_400;

/// Stale-factor count that raises the mass-staleness alert in session.
const MASS_STALENESS_THRESHOLD: usize = 5;

struct MemCacheEntry {
    result: CompositeResult,
    expires_at: Instant,
}

pub struct CompositeEngine {
    store: FactorStore,
    kv: KvStore,
    db: BiasDb,
    breaker: Arc<CircuitBreaker>,
    verifier: Arc<dyn ConditionVerifier>,
    bus: EventBus,
    notifier: Arc<Notifier>,
    mem_cache: RwLock<Option<MemCacheEntry>>,
}

impl CompositeEngine {
    pub fn new(
        store: FactorStore,
        kv: KvStore,
        db: BiasDb,
        breaker: Arc<CircuitBreaker>,
        verifier: Arc<dyn ConditionVerifier>,
        bus: EventBus,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            store,
            kv,
            db,
            breaker,
            verifier,
            bus,
            notifier,
            mem_cache: RwLock::new(None),
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Cached composite if the in-process or KV copy is still fresh.
    pub async fn get_cached(&self) -> Option<CompositeResult> {
        {
            let cache = self.mem_cache.read().await;
            if let Some(entry) = cache.as_ref() {
                if entry.expires_at > Instant::now() {
                    return Some(entry.result.clone());
                }
            }
        }

        match self.kv.get_json::<CompositeResult>(keys::COMPOSITE_LATEST).await {
            Ok(Some(result)) => {
                let mut cache = self.mem_cache.write().await;
                *cache = Some(MemCacheEntry {
                    result: result.clone(),
                    expires_at: Instant::now()
                        + StdDuration::from_secs(COMPOSITE_MEM_CACHE_TTL_SECS),
                });
                Some(result)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to load cached composite: {}", e);
                None
            }
        }
    }

    /// Cached composite when fresh, otherwise a full recompute.
    pub async fn get_or_compute(&self) -> CompositeResult {
        if let Some(cached) = self.get_cached().await {
            return cached;
        }
        self.compute().await
    }

    /// Full composite cycle: decay tick, load, evaluate, persist, detect
    /// changes, alert. Never aborted by persistence failures.
    pub async fn compute(&self) -> CompositeResult {
        self.decay_tick().await;

        let mut readings = std::collections::BTreeMap::new();
        for factor_id in factor_ids() {
            if let Some(reading) = self.store.get_latest(factor_id).await {
                readings.insert(factor_id.to_string(), reading);
            }
        }

        let bearish_shifts = if readings.is_empty() {
            0
        } else {
            self.store.count_bearish_shifts(24).await
        };

        let override_state = self.get_active_override().await;

        let output = evaluate(EvaluateInput {
            readings,
            now: Utc::now(),
            bearish_shifts_24h: bearish_shifts,
            override_state,
            breaker: self.breaker.state(),
        });

        if output.override_cleared {
            self.clear_override(Some("composite_crossed_opposite")).await;
        }

        let result = output.result;
        let previous = self.previous_for_change_detection().await;
        self.cache_result(&result).await;

        if let Err(e) = self.db.insert_composite(&result).await {
            tracing::warn!("Failed to log composite history: {}", e);
        }

        self.emit_alerts(previous.as_ref(), &result).await;

        result
    }

    /// Previous cached composite for change detection, bypassing the
    /// in-process TTL (the KV copy is the last fully computed result).
    async fn previous_for_change_detection(&self) -> Option<CompositeResult> {
        match self.kv.get_json::<CompositeResult>(keys::COMPOSITE_LATEST).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Failed to load previous composite: {}", e);
                None
            }
        }
    }

    async fn cache_result(&self, result: &CompositeResult) {
        {
            let mut cache = self.mem_cache.write().await;
            *cache = Some(MemCacheEntry {
                result: result.clone(),
                expires_at: Instant::now() + StdDuration::from_secs(COMPOSITE_MEM_CACHE_TTL_SECS),
            });
        }
        if let Err(e) = self
            .kv
            .set_json_ex(keys::COMPOSITE_LATEST, result, COMPOSITE_KV_TTL_SECS)
            .await
        {
            tracing::warn!("Failed to cache composite: {}", e);
        }
    }

    async fn decay_tick(&self) {
        match self.breaker.check_decay(self.verifier.as_ref()).await {
            Some(DecayStatus::PendingReset { state }) => {
                let trigger = state.trigger.clone().unwrap_or_default();
                self.bus.publish(BusEvent::CircuitBreakerPendingReset {
                    state,
                    timestamp: Utc::now(),
                });
                self.notifier
                    .send_now(
                        &format!("Circuit Breaker Pending Reset: {trigger}"),
                        &format!(
                            "The `{trigger}` circuit breaker timer has elapsed and the \
                             condition has cleared. Accept or reject the reset; the \
                             scoring modifier is fading linearly toward 1.0."
                        ),
                        AlertSeverity::Warning,
                    )
                    .await;
            }
            Some(DecayStatus::TimerElapsedConditionActive { trigger }) => {
                tracing::debug!("Breaker {} past its timer, condition still active", trigger);
            }
            Some(DecayStatus::FadeUpdated { .. }) | None => {}
        }
    }

    async fn emit_alerts(&self, previous: Option<&CompositeResult>, result: &CompositeResult) {
        let in_session = is_market_session();

        if result.stale_factors.len() >= MASS_STALENESS_THRESHOLD && in_session {
            let mut preview: Vec<&str> =
                result.stale_factors.iter().take(10).map(String::as_str).collect();
            preview.sort_unstable();
            let message = format!(
                "{} factors stale: {}",
                result.stale_factors.len(),
                preview.join(", ")
            );
            self.notifier
                .send_alert("mass_staleness", "Mass Factor Staleness", &message, AlertSeverity::Warning)
                .await;
            if let Err(e) = self
                .db
                .insert_health_alert("Mass Factor Staleness", &message, "warning")
                .await
            {
                tracing::warn!("Failed to record staleness alert: {}", e);
            }
        }

        if let Some(previous) = previous {
            if previous.confidence == bias_core::Confidence::High
                && result.confidence == bias_core::Confidence::Low
                && in_session
            {
                let message = format!(
                    "Composite confidence dropped from HIGH to LOW. Active factors: {}/{}",
                    result.active_factors.len(),
                    bias_core::FACTOR_CONFIG.len()
                );
                self.notifier
                    .send_alert(
                        "confidence_collapse",
                        "Bias Confidence Collapsed",
                        &message,
                        AlertSeverity::Critical,
                    )
                    .await;
                if let Err(e) = self
                    .db
                    .insert_health_alert("Bias Confidence Collapsed", &message, "critical")
                    .await
                {
                    tracing::warn!("Failed to record confidence alert: {}", e);
                }
            }
        }

        let changed_from = match previous {
            None => None,
            Some(previous) if previous.bias_level != result.bias_level => {
                Some(previous.bias_level)
            }
            Some(_) => return,
        };

        self.bus.publish(BusEvent::BiasUpdate {
            payload: BiasUpdatePayload {
                bias_level: result.bias_level,
                bias_numeric: result.bias_numeric,
                composite_score: result.composite_score,
                confidence: result.confidence,
                override_level: result.override_level,
                changed_from,
            },
            timestamp: Utc::now(),
        });

        if let Some(changed_from) = changed_from {
            self.notifier
                .send_alert(
                    "bias_level_changed",
                    "Bias Level Changed",
                    &format!(
                        "Composite bias changed: {} -> {} (score {:+.3})",
                        changed_from, result.bias_level, result.composite_score
                    ),
                    AlertSeverity::Info,
                )
                .await;
        }
    }

    // ------------------------------------------------------------------
    // Override management
    // ------------------------------------------------------------------

    pub async fn set_override(
        &self,
        level: BiasLevel,
        reason: Option<String>,
        expires_hours: Option<i64>,
    ) -> Result<BiasOverride, BiasError> {
        let payload = BiasOverride {
            level,
            reason,
            created_at: Utc::now(),
            expires: expires_hours.map(|h| Utc::now() + Duration::hours(h)),
        };

        match expires_hours {
            Some(hours) => {
                self.kv
                    .set_json_ex(keys::OVERRIDE, &payload, (hours * 3600) as u64)
                    .await?
            }
            None => self.kv.set_json(keys::OVERRIDE, &payload).await?,
        }
        Ok(payload)
    }

    pub async fn clear_override(&self, reason: Option<&str>) {
        if let Err(e) = self.kv.delete(keys::OVERRIDE).await {
            tracing::warn!("Failed to clear override: {}", e);
        }
        if let Some(reason) = reason {
            tracing::info!("Bias override cleared: {}", reason);
        }
    }

    /// Active override, lazily clearing one that has expired.
    pub async fn get_active_override(&self) -> Option<BiasOverride> {
        let override_state = match self.kv.get_json::<BiasOverride>(keys::OVERRIDE).await {
            Ok(state) => state?,
            Err(e) => {
                tracing::warn!("Failed to load active override: {}", e);
                return None;
            }
        };

        if let Some(expires) = override_state.expires {
            if Utc::now() >= expires {
                self.clear_override(Some("expired")).await;
                return None;
            }
        }

        Some(override_state)
    }

    /// Latest reading per factor, for the status endpoint.
    pub async fn factor_snapshot(&self) -> Vec<(String, Option<FactorReading>)> {
        let mut snapshot = Vec::new();
        for factor_id in factor_ids() {
            snapshot.push((factor_id.to_string(), self.store.get_latest(factor_id).await));
        }
        snapshot
    }
}

/// Factors are expected to be stale overnight and on weekends; staleness
/// alerts only fire Mon-Fri 9:00-17:00 ET.
pub fn is_market_session() -> bool {
    let now_et = Utc::now().with_timezone(&chrono_tz::America::New_York);
    let weekday = chrono::Datelike::weekday(&now_et).num_days_from_monday();
    weekday < 5 && (9..=17).contains(&now_et.hour())
}
