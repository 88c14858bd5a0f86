//! Sector rotation factor: offensive (XLK+XLY) vs defensive (XLP+XLU) flows.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::{clamp_score, FactorReading};
use chrono::Utc;

use crate::series::{closes, ratio_series, ratio_stats};
use crate::{FactorIngestor, IngestorContext};

pub struct SectorRotationIngestor {
    ctx: Arc<IngestorContext>,
}

impl SectorRotationIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_sector_rotation(pct_dev: f64, roc_5d: f64) -> f64 {
    let base = if pct_dev >= 2.0 {
        0.7
    } else if pct_dev >= 1.0 {
        0.3
    } else if pct_dev >= -1.0 {
        0.0
    } else if pct_dev >= -2.0 {
        -0.4
    } else {
        -0.8
    };
    let roc_modifier = (roc_5d * 0.2).clamp(-0.3, 0.3);
    clamp_score(base + roc_modifier)
}

fn sum_series(a: &[f64], b: &[f64]) -> Vec<f64> {
    let len = a.len().min(b.len());
    let a = &a[a.len() - len..];
    let b = &b[b.len() - len..];
    a.iter().zip(b.iter()).map(|(x, y)| x + y).collect()
}

#[async_trait]
impl FactorIngestor for SectorRotationIngestor {
    fn factor_id(&self) -> &'static str {
        "sector_rotation"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let xlk = self.ctx.market.daily_bars("XLK", 30).await.ok()?;
        let xly = self.ctx.market.daily_bars("XLY", 30).await.ok()?;
        let xlp = self.ctx.market.daily_bars("XLP", 30).await.ok()?;
        let xlu = self.ctx.market.daily_bars("XLU", 30).await.ok()?;

        let offensive = sum_series(&closes(&xlk), &closes(&xly));
        let defensive = sum_series(&closes(&xlp), &closes(&xlu));
        let ratio = ratio_series(&offensive, &defensive);
        let stats = ratio_stats(&ratio)?;
        let score = score_sector_rotation(stats.pct_dev, stats.roc_5d);

        let detail = format!(
            "Off/Def pct_dev {:+.1}%, 5d ROC {:+.2}%",
            stats.pct_dev, stats.roc_5d
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "yfinance")
                .with_raw_data(serde_json::json!({
                    "xlk": xlk.last().map(|b| b.close),
                    "xly": xly.last().map(|b| b.close),
                    "xlp": xlp.last().map(|b| b.close),
                    "xlu": xlu.last().map(|b| b.close),
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
        assert_eq!(score_sector_rotation(2.5, 0.0), 0.7);
        assert_eq!(score_sector_rotation(1.5, 0.0), 0.3);
        assert_eq!(score_sector_rotation(0.0, 0.0), 0.0);
        assert_eq!(score_sector_rotation(-1.5, 0.0), -0.4);
        assert_eq!(score_sector_rotation(-3.0, 0.0), -0.8);
    }

    #[test]
    fn test_roc_modifier_wider_than_siblings() {
        assert_eq!(score_sector_rotation(0.0, 10.0), 0.3);
        assert_eq!(score_sector_rotation(0.0, -10.0), -0.3);
    }
}
