//! Copper/gold factor: 20-day COPX vs GLD relative performance.
//! Copper outperforming signals economic optimism; gold outperforming
//! signals flight to safety.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::series::{closes, pct_change};
use crate::{FactorIngestor, IngestorContext};

pub struct CopperGoldIngestor {
    ctx: Arc<IngestorContext>,
}

impl CopperGoldIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_copper_gold(spread: f64) -> f64 {
    if spread > 5.0 {
        0.7
    } else if spread > 3.0 {
        0.5
    } else if spread > 1.0 {
        0.2
    } else if spread > -1.0 {
        0.0
    } else if spread > -3.0 {
        -0.2
    } else if spread > -5.0 {
        -0.5
    } else {
        -0.7
    }
}

#[async_trait]
impl FactorIngestor for CopperGoldIngestor {
    fn factor_id(&self) -> &'static str {
        "copper_gold_ratio"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let copx = self.ctx.market.daily_bars("COPX", 30).await.ok()?;
        let gld = self.ctx.market.daily_bars("GLD", 30).await.ok()?;

        let copx_closes = closes(&copx);
        let gld_closes = closes(&gld);
        if copx_closes.len() < 20 || gld_closes.len() < 20 {
            return None;
        }

        let copx_return = pct_change(&copx_closes, 19)?;
        let gld_return = pct_change(&gld_closes, 19)?;
        let spread = copx_return - gld_return;
        let score = score_copper_gold(spread);

        let detail = format!(
            "COPX 20d: {:+.1}%, GLD 20d: {:+.1}%, spread: {:+.1}%",
            copx_return, gld_return, spread
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "yfinance")
                .with_raw_data(serde_json::json!({
                    "copx_return_20d": copx_return,
                    "gld_return_20d": gld_return,
                    "spread": spread,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(score_copper_gold(6.0), 0.7);
        assert_eq!(score_copper_gold(4.0), 0.5);
        assert_eq!(score_copper_gold(2.0), 0.2);
        assert_eq!(score_copper_gold(0.0), 0.0);
        assert_eq!(score_copper_gold(-2.0), -0.2);
        assert_eq!(score_copper_gold(-4.0), -0.5);
        assert_eq!(score_copper_gold(-6.0), -0.7);
    }
}
