//! SPY percent distance from the 200-day SMA. Trend strength with a
//! contrarian pullback at extreme distances in both directions.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::series::{closes, sma_last};
use crate::{FactorIngestor, IngestorContext};

pub struct Spy200SmaIngestor {
    ctx: Arc<IngestorContext>,
}

impl Spy200SmaIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_200sma_distance(pct: f64) -> f64 {
    if pct > 15.0 {
        0.4
    } else if pct > 10.0 {
        0.5
    } else if pct > 5.0 {
        0.6
    } else if pct > 3.0 {
        0.4
    } else if pct > 0.0 {
        0.15
    } else if pct > -3.0 {
        -0.15
    } else if pct > -5.0 {
        -0.4
    } else if pct > -10.0 {
        -0.6
    } else if pct > -15.0 {
        -0.5
    } else {
        -0.4
    }
}

#[async_trait]
impl FactorIngestor for Spy200SmaIngestor {
    fn factor_id(&self) -> &'static str {
        "spy_200sma_distance"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let bars = self.ctx.market.daily_bars("SPY", 300).await.ok()?;
        let closes = closes(&bars);
        if closes.len() < 200 {
            tracing::warn!("SPY 200 SMA: insufficient data ({} bars)", closes.len());
            return None;
        }

        let price = *closes.last()?;
        let sma200 = sma_last(&closes, 200)?;
        if sma200 == 0.0 || !sma200.is_finite() {
            return None;
        }

        let pct_distance = (price - sma200) / sma200 * 100.0;
        let score = score_200sma_distance(pct_distance);

        let detail = format!(
            "SPY {:.2}, 200 SMA {:.2} ({:+.1}%)",
            price, sma200, pct_distance
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "yfinance")
                .with_raw_data(serde_json::json!({
                    "price": price,
                    "sma200": sma200,
                    "pct_distance": pct_distance,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_contrarian_at_extremes() {
        // Stretched above is less bullish than comfortably above
        assert_eq!(score_200sma_distance(20.0), 0.4);
        assert_eq!(score_200sma_distance(7.0), 0.6);
        assert_eq!(score_200sma_distance(1.0), 0.15);
        assert_eq!(score_200sma_distance(-1.0), -0.15);
        assert_eq!(score_200sma_distance(-7.0), -0.6);
        // Deeply oversold eases back toward -0.4
        assert_eq!(score_200sma_distance(-20.0), -0.4);
    }
}
