//! Weekly initial jobless claims (FRED ICSA): level of the 4-week average
//! plus its trend vs the prior four weeks.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::{clamp_score, FactorReading};
use chrono::Utc;

use crate::{FactorIngestor, IngestorContext};

const SERIES: &str = "ICSA";

pub struct InitialClaimsIngestor {
    ctx: Arc<IngestorContext>,
}

impl InitialClaimsIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn claims_trend(avg_4w: f64, prior_avg: f64) -> &'static str {
    if avg_4w > prior_avg * 1.05 {
        "rising"
    } else if avg_4w < prior_avg * 0.95 {
        "falling"
    } else {
        "stable"
    }
}

pub fn score_claims(avg_4w: f64, trend: &str) -> f64 {
    let mut base = if avg_4w < 200_000.0 {
        0.6
    } else if avg_4w < 220_000.0 {
        0.4
    } else if avg_4w < 250_000.0 {
        0.2
    } else if avg_4w < 280_000.0 {
        0.0
    } else if avg_4w < 300_000.0 {
        -0.2
    } else if avg_4w < 350_000.0 {
        -0.5
    } else if avg_4w < 400_000.0 {
        -0.7
    } else {
        -0.9
    };

    if trend == "rising" {
        base -= 0.1;
    } else if trend == "falling" {
        base += 0.1;
    }

    clamp_score(base)
}

#[async_trait]
impl FactorIngestor for InitialClaimsIngestor {
    fn factor_id(&self) -> &'static str {
        "initial_claims"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let mut latest: Option<f64> = None;
        let mut avg_4w: Option<f64> = None;
        let mut trend = "stable".to_string();
        let mut source = "fred";
        let mut cache_fetched_at: Option<String> = None;

        if let Some(econ) = &self.ctx.econ {
            match econ.series(SERIES, 12).await {
                Ok(points) => {
                    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
                    if values.len() >= 4 {
                        let recent = &values[values.len() - 4..];
                        let avg = recent.iter().sum::<f64>() / 4.0;
                        avg_4w = Some(avg);
                        latest = values.last().copied();
                        if values.len() >= 8 {
                            let prior = &values[values.len() - 8..values.len() - 4];
                            let prior_avg = prior.iter().sum::<f64>() / 4.0;
                            trend = claims_trend(avg, prior_avg).to_string();
                        }
                        self.ctx
                            .store
                            .cache_snapshot(
                                SERIES,
                                &serde_json::json!({
                                    "latest": latest,
                                    "avg_4w": avg_4w,
                                    "trend": trend,
                                    "series": SERIES,
                                    "fetched_at": Utc::now().to_rfc3339(),
                                }),
                            )
                            .await;
                    }
                }
                Err(e) => tracing::warn!("initial_claims: FRED fetch failed: {}", e),
            }
        }

        if latest.is_none() || avg_4w.is_none() {
            let cached = self.ctx.store.load_snapshot(SERIES).await?;
            latest = cached.get("latest").and_then(|v| v.as_f64());
            avg_4w = cached.get("avg_4w").and_then(|v| v.as_f64());
            trend = cached
                .get("trend")
                .and_then(|v| v.as_str())
                .unwrap_or("stable")
                .to_string();
            cache_fetched_at = cached
                .get("fetched_at")
                .and_then(|v| v.as_str())
                .map(String::from);
            source = "fred_cache";
            tracing::info!(
                "initial_claims: using cached FRED snapshot ({:?})",
                cache_fetched_at
            );
        }

        let (latest, avg_4w) = (latest?, avg_4w?);
        let score = score_claims(avg_4w, &trend);

        let detail = format!(
            "Claims 4w avg: {:.0}k (latest: {:.0}k, {})",
            avg_4w / 1000.0,
            latest / 1000.0,
            trend
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), source)
                .with_raw_data(serde_json::json!({
                    "latest": latest,
                    "avg_4w": avg_4w,
                    "trend": trend,
                    "cached_fetched_at": cache_fetched_at,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bands() {
        assert_eq!(score_claims(190_000.0, "stable"), 0.6);
        assert_eq!(score_claims(210_000.0, "stable"), 0.4);
        assert_eq!(score_claims(240_000.0, "stable"), 0.2);
        assert_eq!(score_claims(260_000.0, "stable"), 0.0);
        assert_eq!(score_claims(290_000.0, "stable"), -0.2);
        assert_eq!(score_claims(320_000.0, "stable"), -0.5);
        assert_eq!(score_claims(380_000.0, "stable"), -0.7);
        assert_eq!(score_claims(450_000.0, "stable"), -0.9);
    }

    #[test]
    fn test_trend_modifier() {
        assert!((score_claims(240_000.0, "rising") - 0.1).abs() < 1e-9);
        assert!((score_claims(240_000.0, "falling") - 0.3).abs() < 1e-9);
        // Clamped at the bearish end
        assert_eq!(score_claims(450_000.0, "rising"), -1.0);
    }

    #[test]
    fn test_trend_threshold_is_five_pct() {
        assert_eq!(claims_trend(211_000.0, 200_000.0), "rising");
        assert_eq!(claims_trend(189_000.0, 200_000.0), "falling");
        assert_eq!(claims_trend(204_000.0, 200_000.0), "stable");
    }
}
