//! Dollar smile factor: DXY position vs SMA20 combined with the VIX
//! regime. Strong dollar during stress is classic risk-off; weak dollar
//! in calm tape is risk-on.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::series::{closes, sma_last};
use crate::{FactorIngestor, IngestorContext};

pub struct DollarSmileIngestor {
    ctx: Arc<IngestorContext>,
}

impl DollarSmileIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_dollar_smile(dxy_above_sma: bool, vix_elevated: bool) -> f64 {
    match (dxy_above_sma, vix_elevated) {
        (true, true) => -0.6,
        (true, false) => 0.0,
        (false, true) => -0.3,
        (false, false) => 0.5,
    }
}

#[async_trait]
impl FactorIngestor for DollarSmileIngestor {
    fn factor_id(&self) -> &'static str {
        "dollar_smile"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let dxy = self.ctx.market.daily_bars("DX-Y.NYB", 60).await.ok()?;
        let vix = match self.ctx.market.latest_price("^VIX").await {
            Ok(Some(vix)) => vix,
            _ => return None,
        };

        let closes = closes(&dxy);
        let current_dxy = *closes.last()?;
        let sma20 = sma_last(&closes, 20)?;
        if sma20 == 0.0 {
            return None;
        }

        let dxy_above = current_dxy > sma20;
        let vix_elevated = vix > 20.0;
        let score = score_dollar_smile(dxy_above, vix_elevated);

        let detail = format!(
            "DXY {:.2} {} SMA20 {:.2}, VIX {} at {:.1}",
            current_dxy,
            if dxy_above { "above" } else { "below" },
            sma20,
            if vix_elevated { "elevated" } else { "calm" },
            vix
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "yfinance")
                .with_raw_data(serde_json::json!({
                    "dxy": current_dxy,
                    "sma20": sma20,
                    "vix": vix,
                })),
        )
    }
}
