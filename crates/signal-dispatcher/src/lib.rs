//! Signal dispatcher: deduplicates scanner emissions, attaches an
//! immutable bias snapshot and calendar context, persists, broadcasts and
//! optionally kicks the committee context assembler.

use std::sync::Arc;

use bias_core::{CompositeResult, Signal};
use bias_db::BiasDb;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use committee_context::{is_opex_week, ContextAssembler};
use dashmap::DashMap;
use event_bus::{BusEvent, EventBus};
use kv_store::{keys, KvStore};

/// Minutes inside which a duplicate (symbol, signal_type) is dropped.
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 240;

/// Process cache of recently dispatched (symbol, signal_type) pairs.
pub struct DedupeCache {
    recent: DashMap<String, DateTime<Utc>>,
    cooldown_minutes: i64,
}

impl DedupeCache {
    pub fn new(cooldown_minutes: i64) -> Self {
        Self {
            recent: DashMap::new(),
            cooldown_minutes,
        }
    }

    /// True when the pair is outside its cooldown; claims the slot.
    pub fn claim(&self, symbol: &str, signal_type: &str) -> bool {
        let key = format!("{}:{}", symbol.to_uppercase(), signal_type);
        let now = Utc::now();
        if let Some(last) = self.recent.get(&key) {
            if now - *last < Duration::minutes(self.cooldown_minutes) {
                return false;
            }
        }
        self.recent.insert(key, now);
        true
    }
}

pub struct SignalDispatcher {
    db: BiasDb,
    kv: KvStore,
    bus: EventBus,
    assembler: Option<Arc<ContextAssembler>>,
    dedupe: DedupeCache,
    /// Optional tag stamped on persisted signals (e.g. "FOMC day").
    market_event: Option<String>,
}

impl SignalDispatcher {
    pub fn new(db: BiasDb, kv: KvStore, bus: EventBus) -> Self {
        Self {
            db,
            kv,
            bus,
            assembler: None,
            dedupe: DedupeCache::new(DEFAULT_COOLDOWN_MINUTES),
            market_event: None,
        }
    }

    pub fn with_assembler(mut self, assembler: Arc<ContextAssembler>) -> Self {
        self.assembler = Some(assembler);
        self
    }

    pub fn with_cooldown_minutes(mut self, minutes: i64) -> Self {
        self.dedupe = DedupeCache::new(minutes);
        self
    }

    pub fn with_market_event(mut self, tag: Option<String>) -> Self {
        self.market_event = tag;
        self
    }

    /// Dispatch one signal. Returns the enriched signal, or None when it
    /// was deduplicated inside the cooldown window.
    pub async fn dispatch(&self, signal: Signal) -> Option<Signal> {
        if !self.dedupe.claim(&signal.symbol, signal.signal_type.as_str()) {
            tracing::debug!(
                "Dispatch: duplicate {} {} inside cooldown, dropped",
                signal.symbol,
                signal.signal_type
            );
            return None;
        }

        // Immutable bias snapshot at dispatch time.
        let bias_snapshot = match self
            .kv
            .get_json::<CompositeResult>(keys::COMPOSITE_LATEST)
            .await
        {
            Ok(Some(composite)) => Some(serde_json::json!({
                "bias_level": composite.bias_level,
                "bias_numeric": composite.bias_numeric,
                "composite_score": composite.composite_score,
                "confidence": composite.confidence,
                "timestamp": composite.timestamp.to_rfc3339(),
            })),
            _ => None,
        };

        let now_et = signal
            .timestamp
            .with_timezone(&chrono_tz::America::New_York);
        let weekday = now_et.weekday().num_days_from_monday();
        let hour_of_day = now_et.hour();
        let opex_week = is_opex_week(now_et.date_naive());

        if let Err(e) = self
            .db
            .insert_signal(
                &signal,
                bias_snapshot.as_ref(),
                weekday,
                hour_of_day,
                opex_week,
                None,
                self.market_event.as_deref(),
            )
            .await
        {
            tracing::warn!("Dispatch: failed to persist signal {}: {}", signal.signal_id, e);
        }

        self.bus.publish(BusEvent::NewSignal {
            signal: Box::new(signal.clone()),
            timestamp: Utc::now(),
        });

        tracing::info!(
            "Dispatched {} {} on {} (priority {}, {})",
            signal.direction,
            signal.signal_type,
            signal.symbol,
            signal.priority,
            signal.confidence.as_str()
        );

        // Fire-and-forget committee packet for downstream decisioning.
        if let Some(assembler) = &self.assembler {
            let assembler = assembler.clone();
            let for_packet = signal.clone();
            tokio::spawn(async move {
                let packet = assembler.build_packet(Some(&for_packet)).await;
                tracing::debug!(
                    "Committee packet built for {} ({} calendar events)",
                    for_packet.symbol,
                    packet.calendar.len()
                );
            });
        }

        Some(signal)
    }

    /// Dispatch a batch, returning only the signals that survived dedupe.
    pub async fn dispatch_all(&self, signals: Vec<Signal>) -> Vec<Signal> {
        let mut dispatched = Vec::new();
        for signal in signals {
            if let Some(signal) = self.dispatch(signal).await {
                dispatched.push(signal);
            }
        }
        dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_claims_pair_once() {
        let cache = DedupeCache::new(240);
        assert!(cache.claim("NVDA", "GOLDEN_TOUCH"));
        assert!(!cache.claim("NVDA", "GOLDEN_TOUCH"));
        // Case-insensitive on the symbol
        assert!(!cache.claim("nvda", "GOLDEN_TOUCH"));
        // Other types and symbols are independent
        assert!(cache.claim("NVDA", "PULLBACK_ENTRY"));
        assert!(cache.claim("AMD", "GOLDEN_TOUCH"));
    }

    #[test]
    fn test_dedupe_zero_cooldown_always_claims() {
        let cache = DedupeCache::new(0);
        assert!(cache.claim("SPY", "ZONE_UPGRADE"));
        assert!(cache.claim("SPY", "ZONE_UPGRADE"));
    }
}
