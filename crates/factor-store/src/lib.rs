//! Factor reading store: write-through latest keys, time-indexed history,
//! and last-known-good snapshots for FRED-backed factors.
//!
//! The KV latest key is authoritative for composite computation; the
//! durable insert is fire-and-forget and its failure never fails a write.

use bias_core::{factor_config, factor_ids, FactorReading};
use bias_db::BiasDb;
use chrono::{DateTime, Duration, Utc};
use kv_store::{keys, KvStore};

/// Floor for the latest-key TTL; factors with longer staleness windows get
/// `staleness_hours * 3600` instead so macro factors (savita: 1080 h) are
/// not expired by the default.
pub const DEFAULT_LATEST_TTL_SECS: u64 = 86_400;

/// Retention for the per-factor history sorted set.
pub const HISTORY_TTL_SECS: u64 = 86_400 * 7;

/// TTL for FRED last-known-good snapshots.
pub const SNAPSHOT_TTL_SECS: u64 = 172_800;

/// Score drop that counts as a bearish shift for the velocity check.
pub const BEARISH_SHIFT_THRESHOLD: f64 = 0.30;

pub fn latest_ttl_secs(factor_id: &str) -> u64 {
    let staleness_secs = factor_config(factor_id)
        .map(|cfg| cfg.staleness_hours as u64 * 3600)
        .unwrap_or(0);
    DEFAULT_LATEST_TTL_SECS.max(staleness_secs)
}

#[derive(Clone)]
pub struct FactorStore {
    kv: KvStore,
    db: BiasDb,
}

impl FactorStore {
    pub fn new(kv: KvStore, db: BiasDb) -> Self {
        Self { kv, db }
    }

    /// Store a reading: latest key (factor-specific TTL), history entry
    /// scored by source timestamp, pruned to retention, plus an async
    /// durable insert.
    pub async fn store_reading(&self, reading: &FactorReading) {
        let payload = match serde_json::to_string(reading) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Failed to serialize reading {}: {}", reading.factor_id, e);
                return;
            }
        };

        let latest_key = keys::factor_latest(&reading.factor_id);
        let ttl = latest_ttl_secs(&reading.factor_id);
        if let Err(e) = self.kv.set_string_ex(&latest_key, &payload, ttl).await {
            tracing::warn!(
                "Failed to store latest reading {}: {}",
                reading.factor_id,
                e
            );
        }

        let history_key = keys::factor_history(&reading.factor_id);
        let score = reading.timestamp.timestamp() as f64;
        if let Err(e) = self.kv.zadd(&history_key, &payload, score).await {
            tracing::warn!(
                "Failed to append history for {}: {}",
                reading.factor_id,
                e
            );
        } else {
            let _ = self.kv.expire(&history_key, HISTORY_TTL_SECS as i64).await;
            let cutoff = (Utc::now() - Duration::seconds(HISTORY_TTL_SECS as i64)).timestamp();
            let _ = self
                .kv
                .zremrangebyscore(&history_key, f64::NEG_INFINITY, cutoff as f64)
                .await;
        }

        // Durable append is best-effort; readers recover from KV.
        let db = self.db.clone();
        let reading = reading.clone();
        tokio::spawn(async move {
            if let Err(e) = db.insert_factor_reading(&reading).await {
                tracing::warn!(
                    "Failed to store factor reading in db {}: {}",
                    reading.factor_id,
                    e
                );
            }
        });
    }

    pub async fn get_latest(&self, factor_id: &str) -> Option<FactorReading> {
        match self
            .kv
            .get_json::<FactorReading>(&keys::factor_latest(factor_id))
            .await
        {
            Ok(reading) => reading,
            Err(e) => {
                tracing::warn!("Failed to load factor reading {}: {}", factor_id, e);
                None
            }
        }
    }

    /// Most recent history entry with source timestamp at or before `cutoff`.
    pub async fn get_before(
        &self,
        factor_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Option<FactorReading> {
        let key = keys::factor_history(factor_id);
        match self
            .kv
            .zrev_first_at_or_below(&key, cutoff.timestamp() as f64)
            .await
        {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(reading) => Some(reading),
                Err(e) => {
                    tracing::warn!("Failed to decode historical reading {}: {}", factor_id, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to load historical reading {}: {}", factor_id, e);
                None
            }
        }
    }

    /// Count factors whose score dropped by >= 0.30 against their most
    /// recent reading at least `hours` old. Factors without a historical
    /// sample contribute no delta.
    pub async fn count_bearish_shifts(&self, hours: i64) -> usize {
        let cutoff = Utc::now() - Duration::hours(hours);
        let mut count = 0;

        for factor_id in factor_ids() {
            let current = self.get_latest(factor_id).await;
            let previous = self.get_before(factor_id, cutoff).await;
            if let (Some(current), Some(previous)) = (current, previous) {
                if current.score - previous.score <= -BEARISH_SHIFT_THRESHOLD {
                    count += 1;
                }
            }
        }

        count
    }

    /// Persist a successful FRED fetch payload for fallback use.
    pub async fn cache_snapshot(&self, series: &str, payload: &serde_json::Value) {
        let key = keys::fred_snapshot(series);
        if let Err(e) = self.kv.set_json_ex(&key, payload, SNAPSHOT_TTL_SECS).await {
            tracing::warn!("FRED cache write failed for {}: {}", series, e);
        }
    }

    /// Load the latest cached FRED payload, if any.
    pub async fn load_snapshot(&self, series: &str) -> Option<serde_json::Value> {
        match self.kv.get_json::<serde_json::Value>(&keys::fred_snapshot(series)).await {
            Ok(value) => value.filter(|v| v.is_object()),
            Err(e) => {
                tracing::warn!("FRED cache read failed for {}: {}", series, e);
                None
            }
        }
    }

    pub fn kv(&self) -> &KvStore {
        &self.kv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_ttl_floors_at_default() {
        // 4h staleness still keeps the 24h default TTL
        assert_eq!(latest_ttl_secs("vix_term"), DEFAULT_LATEST_TTL_SECS);
        // 1080h macro factor extends well past the default
        assert_eq!(latest_ttl_secs("savita"), 1080 * 3600);
        // ism_manufacturing: 720h
        assert_eq!(latest_ttl_secs("ism_manufacturing"), 720 * 3600);
        // Unknown factors fall back to the default
        assert_eq!(latest_ttl_secs("nonexistent"), DEFAULT_LATEST_TTL_SECS);
    }
}
