//! Manufacturing health via employment trend. NAPM left FRED in 2016, so
//! MANEMP (all manufacturing employees) serves as the proxy, scored on
//! 12-month YoY change.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::{FactorIngestor, IngestorContext};

const SERIES: &str = "MANEMP";
const SNAPSHOT_KEY: &str = "ISM_MANUFACTURING";

pub struct IsmManufacturingIngestor {
    ctx: Arc<IngestorContext>,
}

impl IsmManufacturingIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_mfg_employment(yoy_pct: f64) -> f64 {
    if yoy_pct >= 3.0 {
        0.7
    } else if yoy_pct >= 1.5 {
        0.5
    } else if yoy_pct >= 0.5 {
        0.3
    } else if yoy_pct >= 0.0 {
        0.1
    } else if yoy_pct >= -0.5 {
        -0.1
    } else if yoy_pct >= -1.5 {
        -0.3
    } else if yoy_pct >= -3.0 {
        -0.5
    } else if yoy_pct >= -5.0 {
        -0.7
    } else {
        -0.9
    }
}

fn mfg_state(yoy_pct: f64) -> &'static str {
    if yoy_pct >= 2.0 {
        "strong expansion"
    } else if yoy_pct >= 0.5 {
        "expansion"
    } else if yoy_pct >= -0.5 {
        "flat"
    } else if yoy_pct >= -2.0 {
        "contraction"
    } else {
        "deep contraction"
    }
}

#[async_trait]
impl FactorIngestor for IsmManufacturingIngestor {
    fn factor_id(&self) -> &'static str {
        "ism_manufacturing"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let mut yoy_pct: Option<f64> = None;
        let mut latest_value: Option<f64> = None;
        let mut source = "fred";
        let mut cache_fetched_at: Option<String> = None;

        if let Some(econ) = &self.ctx.econ {
            match econ.series(SERIES, 14).await {
                Ok(points) => {
                    if points.len() >= 2 {
                        let latest = points[points.len() - 1].value;
                        let year_ago = if points.len() >= 12 {
                            points[points.len() - 12].value
                        } else {
                            points[0].value
                        };
                        latest_value = Some(latest);
                        if year_ago > 0.0 {
                            yoy_pct = Some((latest - year_ago) / year_ago * 100.0);
                        }
                    }
                    if let Some(yoy) = yoy_pct {
                        self.ctx
                            .store
                            .cache_snapshot(
                                SNAPSHOT_KEY,
                                &serde_json::json!({
                                    "yoy_pct": yoy,
                                    "latest_value": latest_value,
                                    "series": SERIES,
                                    "fetched_at": Utc::now().to_rfc3339(),
                                }),
                            )
                            .await;
                    } else {
                        tracing::warn!("ism_manufacturing: insufficient data for YoY calculation");
                    }
                }
                Err(e) => tracing::warn!("ism_manufacturing: FRED fetch failed: {}", e),
            }
        }

        if yoy_pct.is_none() {
            let cached = self.ctx.store.load_snapshot(SNAPSHOT_KEY).await?;
            yoy_pct = cached.get("yoy_pct").and_then(|v| v.as_f64());
            latest_value = cached.get("latest_value").and_then(|v| v.as_f64());
            cache_fetched_at = cached
                .get("fetched_at")
                .and_then(|v| v.as_str())
                .map(String::from);
            source = "fred_cache";
            tracing::info!(
                "ism_manufacturing: using cached FRED snapshot ({:?})",
                cache_fetched_at
            );
        }

        let yoy_pct = yoy_pct?;
        let score = score_mfg_employment(yoy_pct);
        let latest_label = latest_value
            .map(|v| format!("{:.1}M", v / 1000.0))
            .unwrap_or_else(|| "?".to_string());
        let detail = format!(
            "Mfg Employment: {}, YoY {:+.1}% ({})",
            latest_label,
            yoy_pct,
            mfg_state(yoy_pct)
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), source)
                .with_raw_data(serde_json::json!({
                    "yoy_pct": yoy_pct,
                    "latest_value": latest_value,
                    "series": SERIES,
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
        assert_eq!(score_mfg_employment(3.5), 0.7);
        assert_eq!(score_mfg_employment(2.0), 0.5);
        assert_eq!(score_mfg_employment(1.0), 0.3);
        assert_eq!(score_mfg_employment(0.2), 0.1);
        assert_eq!(score_mfg_employment(-0.2), -0.1);
        assert_eq!(score_mfg_employment(-1.0), -0.3);
        assert_eq!(score_mfg_employment(-2.0), -0.5);
        assert_eq!(score_mfg_employment(-4.0), -0.7);
        assert_eq!(score_mfg_employment(-6.0), -0.9);
    }
}
