//! Excess CAPE yield: Shiller CAPE earnings yield minus the 10-year
//! Treasury yield. Low or negative ECY means equities offer no premium
//! over bonds.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::{FactorIngestor, IngestorContext};

const CAPE_SERIES: &[&str] = &["CAPE", "SP500_PE_RATIO_MONTH"];
const SNAPSHOT_KEY: &str = "CAPE";

pub struct ExcessCapeIngestor {
    ctx: Arc<IngestorContext>,
}

impl ExcessCapeIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }

    async fn cape_ratio(&self) -> Option<f64> {
        if let Some(econ) = &self.ctx.econ {
            for series in CAPE_SERIES {
                match econ.series(series, 3).await {
                    Ok(points) => {
                        if let Some(latest) = points.last() {
                            self.ctx
                                .store
                                .cache_snapshot(
                                    SNAPSHOT_KEY,
                                    &serde_json::json!({
                                        "value": latest.value,
                                        "series": series,
                                        "fetched_at": Utc::now().to_rfc3339(),
                                    }),
                                )
                                .await;
                            return Some(latest.value);
                        }
                    }
                    Err(e) => tracing::debug!("excess_cape: {} fetch failed: {}", series, e),
                }
            }
        }

        let cached = self.ctx.store.load_snapshot(SNAPSHOT_KEY).await?;
        cached.get("value").and_then(|v| v.as_f64())
    }
}

pub fn score_excess_cape(ecy: f64) -> f64 {
    if ecy >= 3.0 {
        0.6
    } else if ecy >= 2.0 {
        0.3
    } else if ecy >= 1.0 {
        0.0
    } else if ecy >= 0.0 {
        -0.4
    } else {
        -0.8
    }
}

#[async_trait]
impl FactorIngestor for ExcessCapeIngestor {
    fn factor_id(&self) -> &'static str {
        "excess_cape"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let cape = self.cape_ratio().await?;
        let ten_year = match self.ctx.market.latest_price("^TNX").await {
            Ok(Some(yld)) => yld / 100.0,
            _ => return None,
        };

        if cape <= 0.0 {
            return None;
        }
        let cape_ey = 1.0 / cape;
        let ecy = (cape_ey - ten_year) * 100.0;
        let score = score_excess_cape(ecy);

        let detail = format!(
            "CAPE {:.1}, EY {:.1}%, 10Y {:.1}%, ECY {:.1}%",
            cape,
            cape_ey * 100.0,
            ten_year * 100.0,
            ecy
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "fred")
                .with_raw_data(serde_json::json!({
                    "cape": cape,
                    "earnings_yield": cape_ey,
                    "ten_year": ten_year,
                    "ecy": ecy,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(score_excess_cape(3.5), 0.6);
        assert_eq!(score_excess_cape(2.5), 0.3);
        assert_eq!(score_excess_cape(1.5), 0.0);
        assert_eq!(score_excess_cape(0.5), -0.4);
        assert_eq!(score_excess_cape(-0.5), -0.8);
    }
}
