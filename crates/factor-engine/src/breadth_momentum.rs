//! Breadth momentum: 5-day rate of change of the RSP/SPY ratio.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::series::{closes, pct_change, ratio_series};
use crate::{FactorIngestor, IngestorContext};

pub struct BreadthMomentumIngestor {
    ctx: Arc<IngestorContext>,
}

impl BreadthMomentumIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_breadth_roc(roc: f64) -> f64 {
    if roc > 1.0 {
        0.7
    } else if roc > 0.5 {
        0.4
    } else if roc > 0.2 {
        0.2
    } else if roc > -0.2 {
        0.0
    } else if roc > -0.5 {
        -0.2
    } else if roc > -1.0 {
        -0.4
    } else {
        -0.7
    }
}

#[async_trait]
impl FactorIngestor for BreadthMomentumIngestor {
    fn factor_id(&self) -> &'static str {
        "breadth_momentum"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let rsp = self.ctx.market.daily_bars("RSP", 15).await.ok()?;
        let spy = self.ctx.market.daily_bars("SPY", 15).await.ok()?;

        let ratio = ratio_series(&closes(&rsp), &closes(&spy));
        if ratio.len() < 6 {
            return None;
        }
        let roc = pct_change(&ratio, 5)?;
        let score = score_breadth_roc(roc);

        let state = if roc > 0.2 {
            "improving"
        } else if roc < -0.2 {
            "deteriorating"
        } else {
            "stable"
        };
        let detail = format!("RSP/SPY ratio 5d ROC: {:+.2}% ({})", roc, state);

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "yfinance")
                .with_raw_data(serde_json::json!({
                    "ratio_now": ratio.last(),
                    "roc_pct": roc,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(score_breadth_roc(1.5), 0.7);
        assert_eq!(score_breadth_roc(0.7), 0.4);
        assert_eq!(score_breadth_roc(0.3), 0.2);
        assert_eq!(score_breadth_roc(0.0), 0.0);
        assert_eq!(score_breadth_roc(-0.3), -0.2);
        assert_eq!(score_breadth_roc(-0.7), -0.4);
        assert_eq!(score_breadth_roc(-1.5), -0.7);
    }
}
