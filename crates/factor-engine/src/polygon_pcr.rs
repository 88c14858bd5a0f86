//! SPY put/call volume ratio from the options-chain provider. Contrarian
//! like the CBOE ratio, with bands shifted for volume data.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::{FactorIngestor, IngestorContext};

pub struct PolygonPcrIngestor {
    ctx: Arc<IngestorContext>,
}

impl PolygonPcrIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_volume_pcr(ratio: f64) -> f64 {
    if ratio >= 1.3 {
        0.7
    } else if ratio >= 1.1 {
        0.5
    } else if ratio >= 1.0 {
        0.3
    } else if ratio >= 0.9 {
        0.1
    } else if ratio >= 0.8 {
        0.0
    } else if ratio >= 0.7 {
        -0.2
    } else if ratio >= 0.6 {
        -0.4
    } else {
        -0.7
    }
}

#[async_trait]
impl FactorIngestor for PolygonPcrIngestor {
    fn factor_id(&self) -> &'static str {
        "polygon_pcr"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let options = self.ctx.options.as_ref()?;
        let ratio = match options.put_call_volume_ratio("SPY").await {
            Ok(Some(ratio)) => ratio,
            Ok(None) => {
                tracing::warn!("polygon_pcr: no chain volume, excluding from composite");
                return None;
            }
            Err(e) => {
                tracing::warn!("polygon_pcr: chain fetch failed: {}", e);
                return None;
            }
        };

        let score = score_volume_pcr(ratio);
        let detail = format!("SPY P/C volume ratio: {:.3}", ratio);

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "polygon")
                .with_raw_data(serde_json::json!({"ratio": ratio})),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contrarian_bands() {
        assert_eq!(score_volume_pcr(1.4), 0.7);
        assert_eq!(score_volume_pcr(1.15), 0.5);
        assert_eq!(score_volume_pcr(1.05), 0.3);
        assert_eq!(score_volume_pcr(0.95), 0.1);
        assert_eq!(score_volume_pcr(0.85), 0.0);
        assert_eq!(score_volume_pcr(0.75), -0.2);
        assert_eq!(score_volume_pcr(0.65), -0.4);
        assert_eq!(score_volume_pcr(0.5), -0.7);
    }
}
