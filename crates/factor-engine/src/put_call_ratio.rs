//! CBOE equity put/call ratio, pushed once daily by webhook. Contrarian:
//! heavy put buying (fear) scores bullish, complacency scores bearish.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::{clamp_score, FactorReading, TimestampSource};
use kv_store::keys;

use crate::webhook::extract_source_timestamp;
use crate::{FactorIngestor, IngestorContext};

pub struct PutCallRatioIngestor {
    ctx: Arc<IngestorContext>,
}

impl PutCallRatioIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_pcr(pcr: f64) -> f64 {
    let score = if pcr >= 1.2 {
        0.8
    } else if pcr >= 1.0 {
        0.5
    } else if pcr >= 0.9 {
        0.3
    } else if pcr >= 0.8 {
        0.1
    } else if pcr >= 0.7 {
        0.0
    } else if pcr >= 0.6 {
        -0.3
    } else if pcr >= 0.5 {
        -0.5
    } else {
        -0.8
    };
    clamp_score(score)
}

fn pcr_label(pcr: f64) -> &'static str {
    if pcr >= 0.9 {
        "fear"
    } else if pcr <= 0.7 {
        "complacency"
    } else {
        "normal"
    }
}

#[async_trait]
impl FactorIngestor for PutCallRatioIngestor {
    fn factor_id(&self) -> &'static str {
        "put_call_ratio"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let payload = match self
            .ctx
            .store
            .kv()
            .get_json::<serde_json::Value>(keys::PCR_CURRENT)
            .await
        {
            Ok(Some(payload)) => payload,
            _ => {
                tracing::warn!("Put/Call ratio: no PCR payload, excluding from composite");
                return None;
            }
        };

        let pcr = payload.get("pcr").and_then(|v| v.as_f64()).unwrap_or(0.0);
        if pcr <= 0.0 {
            tracing::warn!("Put/Call ratio: invalid PCR value, excluding from composite");
            return None;
        }

        let score = score_pcr(pcr);
        let (timestamp, ts_source) = extract_source_timestamp(&payload);
        if ts_source == TimestampSource::Fallback {
            tracing::warn!("No source timestamp for put_call_ratio, using wall-clock fallback");
        }

        let detail = format!("CBOE P/C ratio: {:.3} ({})", pcr, pcr_label(pcr));

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
    fn test_contrarian_bands() {
        assert_eq!(score_pcr(1.3), 0.8);
        assert_eq!(score_pcr(1.1), 0.5);
        assert_eq!(score_pcr(0.95), 0.3);
        assert_eq!(score_pcr(0.85), 0.1);
        assert_eq!(score_pcr(0.75), 0.0);
        assert_eq!(score_pcr(0.65), -0.3);
        assert_eq!(score_pcr(0.55), -0.5);
        assert_eq!(score_pcr(0.4), -0.8);
    }
}
