//! Market breadth factor (RSP/SPY ratio vs its 20-day trend).

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::{clamp_score, FactorReading};
use chrono::Utc;

use crate::series::{closes, ratio_series, ratio_stats};
use crate::{FactorIngestor, IngestorContext};

pub struct MarketBreadthIngestor {
    ctx: Arc<IngestorContext>,
}

impl MarketBreadthIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_market_breadth(pct_dev: f64, roc_5d: f64) -> f64 {
    let base = if pct_dev >= 1.5 {
        0.8
    } else if pct_dev >= 0.5 {
        0.4
    } else if pct_dev >= -0.5 {
        0.0
    } else if pct_dev >= -1.5 {
        -0.4
    } else {
        -0.8
    };
    let roc_modifier = (roc_5d * 0.15).clamp(-0.2, 0.2);
    clamp_score(base + roc_modifier)
}

#[async_trait]
impl FactorIngestor for MarketBreadthIngestor {
    fn factor_id(&self) -> &'static str {
        "market_breadth"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let rsp = self.ctx.market.daily_bars("RSP", 30).await.ok()?;
        let spy = self.ctx.market.daily_bars("SPY", 30).await.ok()?;

        let ratio = ratio_series(&closes(&rsp), &closes(&spy));
        let stats = ratio_stats(&ratio)?;
        let score = score_market_breadth(stats.pct_dev, stats.roc_5d);

        let detail = format!(
            "RSP/SPY {:.4} vs SMA20 {:.4} ({:+.1}%), 5d ROC {:+.2}%",
            stats.current, stats.sma20, stats.pct_dev, stats.roc_5d
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "yfinance")
                .with_raw_data(serde_json::json!({
                    "rsp": rsp.last().map(|b| b.close),
                    "spy": spy.last().map(|b| b.close),
                    "ratio": stats.current,
                    "sma20": stats.sma20,
                    "pct_dev": stats.pct_dev,
                    "roc_5d": stats.roc_5d,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(score_market_breadth(1.6, 0.0), 0.8);
        assert_eq!(score_market_breadth(0.7, 0.0), 0.4);
        assert_eq!(score_market_breadth(0.0, 0.0), 0.0);
        assert_eq!(score_market_breadth(-1.0, 0.0), -0.4);
        assert_eq!(score_market_breadth(-2.0, 0.0), -0.8);
    }
}
