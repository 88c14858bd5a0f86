//! Absolute VIX level: market fear vs complacency.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::{FactorIngestor, IngestorContext};

pub struct VixRegimeIngestor {
    ctx: Arc<IngestorContext>,
}

impl VixRegimeIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_vix_level(vix: f64) -> f64 {
    if vix > 35.0 {
        -0.9
    } else if vix > 30.0 {
        -0.7
    } else if vix > 25.0 {
        -0.5
    } else if vix > 20.0 {
        -0.3
    } else if vix > 18.0 {
        -0.1
    } else if vix > 14.0 {
        0.2
    } else if vix > 12.0 {
        0.4
    } else {
        // Extreme complacency, still bullish but stretched
        0.3
    }
}

fn regime_label(vix: f64) -> &'static str {
    if vix > 30.0 {
        "panic"
    } else if vix > 25.0 {
        "fear"
    } else if vix > 20.0 {
        "elevated"
    } else if vix > 18.0 {
        "cautious"
    } else if vix > 14.0 {
        "normal"
    } else {
        "complacent"
    }
}

#[async_trait]
impl FactorIngestor for VixRegimeIngestor {
    fn factor_id(&self) -> &'static str {
        "vix_regime"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let vix = match self.ctx.market.latest_price("^VIX").await {
            Ok(Some(vix)) => vix,
            _ => {
                tracing::warn!("VIX regime: could not fetch VIX price");
                return None;
            }
        };

        let score = score_vix_level(vix);
        let detail = format!("VIX at {:.1} ({})", vix, regime_label(vix));

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "yfinance")
                .with_raw_data(serde_json::json!({"vix": vix})),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(score_vix_level(40.0), -0.9);
        assert_eq!(score_vix_level(32.0), -0.7);
        assert_eq!(score_vix_level(27.0), -0.5);
        assert_eq!(score_vix_level(22.0), -0.3);
        assert_eq!(score_vix_level(19.0), -0.1);
        assert_eq!(score_vix_level(16.0), 0.2);
        assert_eq!(score_vix_level(13.0), 0.4);
        // Extreme complacency backs off, not full bullish
        assert_eq!(score_vix_level(10.0), 0.3);
    }
}
