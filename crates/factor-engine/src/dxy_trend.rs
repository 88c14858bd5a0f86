//! DXY trend factor: 5-day change plus SMA20 context. A strong and
//! strengthening dollar is typically risk-off for equities.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::series::{closes, pct_change, sma_last};
use crate::{FactorIngestor, IngestorContext};

pub struct DxyTrendIngestor {
    ctx: Arc<IngestorContext>,
}

impl DxyTrendIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_dxy_trend(pct_change_5d: f64, above_sma: bool) -> f64 {
    if pct_change_5d > 0.5 && above_sma {
        -1.0
    } else if pct_change_5d > 0.5 {
        -0.5
    } else if pct_change_5d < -0.5 && !above_sma {
        1.0
    } else if pct_change_5d < -0.5 {
        0.5
    } else {
        0.0
    }
}

#[async_trait]
impl FactorIngestor for DxyTrendIngestor {
    fn factor_id(&self) -> &'static str {
        "dxy_trend"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let bars = self.ctx.market.daily_bars("DX-Y.NYB", 30).await.ok()?;
        let closes = closes(&bars);
        if closes.len() < 20 {
            tracing::warn!("DXY trend: insufficient lookback");
            return None;
        }

        let current = *closes.last()?;
        let sma20 = sma_last(&closes, 20)?;
        let pct_change_5d = pct_change(&closes, 5)?;
        let above_sma = current > sma20;

        let score = score_dxy_trend(pct_change_5d, above_sma);
        let trend = if pct_change_5d > 0.5 {
            "rising"
        } else if pct_change_5d < -0.5 {
            "falling"
        } else {
            "flat"
        };

        let detail = format!(
            "DXY {:.2} vs SMA20 {:.2} ({}), 5d {:+.2}% ({})",
            current,
            sma20,
            if above_sma { "above" } else { "below" },
            pct_change_5d,
            trend
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "yfinance")
                .with_raw_data(serde_json::json!({
                    "current": current,
                    "sma_20": sma20,
                    "above_sma": above_sma,
                    "pct_change_5d": pct_change_5d,
                    "trend": trend,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrants() {
        assert_eq!(score_dxy_trend(1.0, true), -1.0);
        assert_eq!(score_dxy_trend(1.0, false), -0.5);
        assert_eq!(score_dxy_trend(-1.0, false), 1.0);
        assert_eq!(score_dxy_trend(-1.0, true), 0.5);
        assert_eq!(score_dxy_trend(0.0, true), 0.0);
        assert_eq!(score_dxy_trend(0.0, false), 0.0);
    }
}
