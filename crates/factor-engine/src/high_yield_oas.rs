//! ICE BofA US High Yield OAS (FRED BAMLH0A0HYM2): a more precise credit
//! stress gauge than the HYG/TLT ratio.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::{FactorIngestor, IngestorContext};

const SERIES: &str = "BAMLH0A0HYM2";

pub struct HighYieldOasIngestor {
    ctx: Arc<IngestorContext>,
}

impl HighYieldOasIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_oas(oas: f64) -> f64 {
    if oas < 2.5 {
        0.6
    } else if oas < 3.0 {
        0.4
    } else if oas < 3.5 {
        0.2
    } else if oas < 4.0 {
        0.0
    } else if oas < 4.5 {
        -0.2
    } else if oas < 5.0 {
        -0.4
    } else if oas < 6.0 {
        -0.6
    } else if oas < 7.0 {
        -0.75
    } else {
        -0.9
    }
}

fn oas_state(oas: f64) -> &'static str {
    if oas > 7.0 {
        "crisis"
    } else if oas > 5.0 {
        "stress"
    } else if oas > 4.0 {
        "caution"
    } else if oas > 3.0 {
        "normal"
    } else {
        "risk-on"
    }
}

#[async_trait]
impl FactorIngestor for HighYieldOasIngestor {
    fn factor_id(&self) -> &'static str {
        "high_yield_oas"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let mut oas: Option<f64> = None;
        let mut source = "fred";
        let mut cache_fetched_at: Option<String> = None;

        if let Some(econ) = &self.ctx.econ {
            match econ.series(SERIES, 10).await {
                Ok(points) => {
                    if let Some(latest) = points.last() {
                        oas = Some(latest.value);
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
                Err(e) => tracing::warn!("high_yield_oas: FRED fetch failed: {}", e),
            }
        }

        if oas.is_none() {
            let cached = self.ctx.store.load_snapshot(SERIES).await?;
            oas = cached.get("value").and_then(|v| v.as_f64());
            cache_fetched_at = cached
                .get("fetched_at")
                .and_then(|v| v.as_str())
                .map(String::from);
            source = "fred_cache";
            tracing::info!(
                "high_yield_oas: using cached FRED snapshot ({:?})",
                cache_fetched_at
            );
        }

        let oas = oas?;
        let score = score_oas(oas);
        let detail = format!("HY OAS: {:.2}% ({})", oas, oas_state(oas));

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), source)
                .with_raw_data(serde_json::json!({
                    "oas_pct": oas,
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
        assert_eq!(score_oas(2.0), 0.6);
        assert_eq!(score_oas(2.8), 0.4);
        assert_eq!(score_oas(3.2), 0.2);
        assert_eq!(score_oas(3.8), 0.0);
        assert_eq!(score_oas(4.2), -0.2);
        assert_eq!(score_oas(4.8), -0.4);
        assert_eq!(score_oas(5.5), -0.6);
        assert_eq!(score_oas(6.5), -0.75);
        assert_eq!(score_oas(8.0), -0.9);
    }
}
