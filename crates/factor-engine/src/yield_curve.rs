//! 10Y-2Y Treasury spread from FRED, with last-known-good snapshot
//! fallback when the live fetch fails.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::{FactorIngestor, IngestorContext};

const SERIES: &str = "T10Y2Y";

pub struct YieldCurveIngestor {
    ctx: Arc<IngestorContext>,
}

impl YieldCurveIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_yield_curve(spread: f64) -> f64 {
    if spread > 1.5 {
        0.7
    } else if spread > 1.0 {
        0.5
    } else if spread > 0.5 {
        0.3
    } else if spread > 0.0 {
        0.1
    } else if spread > -0.25 {
        -0.2
    } else if spread > -0.5 {
        -0.4
    } else if spread > -1.0 {
        -0.6
    } else {
        -0.8
    }
}

fn curve_state(spread: f64) -> &'static str {
    if spread > 0.0 {
        "normal"
    } else if spread > -0.5 {
        "flat/warning"
    } else {
        "inverted"
    }
}

#[async_trait]
impl FactorIngestor for YieldCurveIngestor {
    fn factor_id(&self) -> &'static str {
        "yield_curve"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let mut spread: Option<f64> = None;
        let mut source = "fred";
        let mut cache_fetched_at: Option<String> = None;

        if let Some(econ) = &self.ctx.econ {
            match econ.series(SERIES, 30).await {
                Ok(points) => {
                    if let Some(latest) = points.last() {
                        spread = Some(latest.value);
                        self.ctx
                            .store
                            .cache_snapshot(
                                SERIES,
                                &serde_json::json!({
                                    "value": latest.value,
                                    "series": SERIES,
                                    "fetched_at": Utc::now().to_rfc3339(),
                                }),
                            )
                            .await;
                    }
                }
                Err(e) => tracing::warn!("yield_curve: FRED fetch failed: {}", e),
            }
        }

        if spread.is_none() {
            let cached = self.ctx.store.load_snapshot(SERIES).await?;
            spread = cached.get("value").and_then(|v| v.as_f64());
            cache_fetched_at = cached
                .get("fetched_at")
                .and_then(|v| v.as_str())
                .map(String::from);
            source = "fred_cache";
            tracing::info!(
                "yield_curve: using cached FRED snapshot ({:?})",
                cache_fetched_at
            );
        }

        let spread = spread?;
        let score = score_yield_curve(spread);
        let detail = format!("10Y-2Y spread: {:+.2}% ({})", spread, curve_state(spread));

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), source)
                .with_raw_data(serde_json::json!({
                    "spread_pct": spread,
                    "cached_fetched_at": cache_fetched_at,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(score_yield_curve(2.0), 0.7);
        assert_eq!(score_yield_curve(1.2), 0.5);
        assert_eq!(score_yield_curve(0.7), 0.3);
        assert_eq!(score_yield_curve(0.2), 0.1);
        assert_eq!(score_yield_curve(-0.1), -0.2);
        assert_eq!(score_yield_curve(-0.4), -0.4);
        assert_eq!(score_yield_curve(-0.8), -0.6);
        assert_eq!(score_yield_curve(-1.5), -0.8);
    }
}
