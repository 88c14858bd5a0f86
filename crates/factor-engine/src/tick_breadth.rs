//! TICK breadth factor. The webhook handler writes the session's TICK
//! range to the KV store; this ingestor reads and scores it.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::{clamp_score, FactorReading};
use kv_store::keys;

use crate::webhook::extract_source_timestamp;
use crate::{FactorIngestor, IngestorContext};

pub struct TickBreadthIngestor {
    ctx: Arc<IngestorContext>,
}

impl TickBreadthIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_tick(tick_avg: f64, tick_high: f64, tick_low: f64) -> f64 {
    let base = if tick_avg > 400.0 {
        0.8
    } else if tick_avg > 200.0 {
        0.4
    } else if tick_avg > -200.0 {
        0.0
    } else if tick_avg > -400.0 {
        -0.4
    } else {
        -0.8
    };

    let extreme_mod = if tick_low < -1000.0 {
        -0.2
    } else if tick_high > 1000.0 {
        0.2
    } else {
        0.0
    };

    clamp_score(base + extreme_mod)
}

#[async_trait]
impl FactorIngestor for TickBreadthIngestor {
    fn factor_id(&self) -> &'static str {
        "tick_breadth"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let payload = match self
            .ctx
            .store
            .kv()
            .get_json::<serde_json::Value>(keys::TICK_CURRENT)
            .await
        {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::warn!("TICK breadth: no payload in KV, excluding from composite");
                return None;
            }
            Err(e) => {
                tracing::warn!("TICK breadth: failed to load payload: {}", e);
                return None;
            }
        };

        let tick_high = payload.get("tick_high").and_then(|v| v.as_f64())?;
        let tick_low = payload.get("tick_low").and_then(|v| v.as_f64())?;
        let tick_avg = payload
            .get("tick_avg")
            .and_then(|v| v.as_f64())
            .unwrap_or((tick_high + tick_low) / 2.0);
        let tick_close = payload
            .get("tick_close")
            .and_then(|v| v.as_f64())
            .unwrap_or(tick_avg);

        let score = score_tick(tick_avg, tick_high, tick_low);
        let (timestamp, ts_source) = extract_source_timestamp(&payload);

        let detail = format!(
            "TICK avg {:+.0}, range [{:.0}, {:.0}], close {:+.0}",
            tick_avg, tick_low, tick_high, tick_close
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, timestamp, "tradingview")
                .with_raw_data(payload)
                .with_timestamp_source(ts_source),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(score_tick(500.0, 800.0, -200.0), 0.8);
        assert_eq!(score_tick(300.0, 800.0, -200.0), 0.4);
        assert_eq!(score_tick(0.0, 500.0, -500.0), 0.0);
        assert_eq!(score_tick(-300.0, 200.0, -800.0), -0.4);
        assert_eq!(score_tick(-500.0, 200.0, -900.0), -0.8);
    }

    #[test]
    fn test_extreme_modifier() {
        // Extreme downside prints outweigh the average
        assert!((score_tick(0.0, 500.0, -1200.0) - (-0.2)).abs() < 1e-9);
        // Extreme upside print boosts
        assert!((score_tick(0.0, 1200.0, -500.0) - 0.2).abs() < 1e-9);
        // Low extreme wins when both fire
        assert!((score_tick(0.0, 1200.0, -1200.0) - (-0.2)).abs() < 1e-9);
    }
}
