//! Credit spreads factor (HYG/TLT ratio vs its 20-day trend).

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::{clamp_score, FactorReading};
use chrono::Utc;

use crate::series::{closes, ratio_series, ratio_stats};
use crate::{FactorIngestor, IngestorContext};

pub struct CreditSpreadsIngestor {
    ctx: Arc<IngestorContext>,
}

impl CreditSpreadsIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_credit_spreads(pct_dev: f64, roc_5d: f64) -> f64 {
    let base = if pct_dev >= 2.0 {
        0.8
    } else if pct_dev >= 1.0 {
        0.4
    } else if pct_dev >= -1.0 {
        0.0
    } else if pct_dev >= -2.0 {
        -0.4
    } else {
        -0.8
    };
    let roc_modifier = (roc_5d * 0.1).clamp(-0.2, 0.2);
    clamp_score(base + roc_modifier)
}

#[async_trait]
impl FactorIngestor for CreditSpreadsIngestor {
    fn factor_id(&self) -> &'static str {
        "credit_spreads"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let hyg = self.ctx.market.daily_bars("HYG", 30).await.ok()?;
        let tlt = self.ctx.market.daily_bars("TLT", 30).await.ok()?;

        let ratio = ratio_series(&closes(&hyg), &closes(&tlt));
        let stats = ratio_stats(&ratio)?;
        let score = score_credit_spreads(stats.pct_dev, stats.roc_5d);

        let detail = format!(
            "HYG/TLT {:.3} vs SMA20 {:.3} ({:+.1}%), 5d ROC {:+.2}%",
            stats.current, stats.sma20, stats.pct_dev, stats.roc_5d
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "yfinance")
                .with_raw_data(serde_json::json!({
                    "hyg": hyg.last().map(|b| b.close),
                    "tlt": tlt.last().map(|b| b.close),
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
        assert_eq!(score_credit_spreads(2.5, 0.0), 0.8);
        assert_eq!(score_credit_spreads(1.2, 0.0), 0.4);
        assert_eq!(score_credit_spreads(0.0, 0.0), 0.0);
        assert_eq!(score_credit_spreads(-1.5, 0.0), -0.4);
        assert_eq!(score_credit_spreads(-3.0, 0.0), -0.8);
    }

    #[test]
    fn test_roc_modifier_capped() {
        // Huge momentum only moves the score by at most 0.2
        assert_eq!(score_credit_spreads(0.0, 50.0), 0.2);
        assert_eq!(score_credit_spreads(0.0, -50.0), -0.2);
        // Total always clamps to [-1, 1]
        assert_eq!(score_credit_spreads(2.5, 50.0), 1.0);
    }
}
