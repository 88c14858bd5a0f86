//! SPY vs its 9-period EMA: simple short-term momentum gauge.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::series::{closes, ema_last};
use crate::{FactorIngestor, IngestorContext};

pub struct SpyTrendIntradayIngestor {
    ctx: Arc<IngestorContext>,
}

impl SpyTrendIntradayIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_ema_distance(pct: f64) -> f64 {
    if pct > 2.0 {
        0.7
    } else if pct > 1.0 {
        0.5
    } else if pct > 0.3 {
        0.2
    } else if pct > -0.3 {
        0.0
    } else if pct > -1.0 {
        -0.2
    } else if pct > -2.0 {
        -0.5
    } else {
        -0.7
    }
}

#[async_trait]
impl FactorIngestor for SpyTrendIntradayIngestor {
    fn factor_id(&self) -> &'static str {
        "spy_trend_intraday"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let bars = self.ctx.market.daily_bars("SPY", 20).await.ok()?;
        let closes = closes(&bars);
        if closes.len() < 10 {
            tracing::warn!("SPY trend intraday: insufficient data");
            return None;
        }

        let price = *closes.last()?;
        let ema9 = ema_last(&closes, 9)?;
        if ema9 == 0.0 {
            return None;
        }

        let pct_from_ema = (price - ema9) / ema9 * 100.0;
        let score = score_ema_distance(pct_from_ema);

        let detail = format!(
            "SPY {:.2} vs 9 EMA {:.2} ({:+.2}%)",
            price, ema9, pct_from_ema
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "yfinance")
                .with_raw_data(serde_json::json!({
                    "price": price,
                    "ema9": ema9,
                    "pct_from_ema": pct_from_ema,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(score_ema_distance(2.5), 0.7);
        assert_eq!(score_ema_distance(1.5), 0.5);
        assert_eq!(score_ema_distance(0.5), 0.2);
        assert_eq!(score_ema_distance(0.0), 0.0);
        assert_eq!(score_ema_distance(-0.5), -0.2);
        assert_eq!(score_ema_distance(-1.5), -0.5);
        assert_eq!(score_ema_distance(-2.5), -0.7);
    }
}
