//! Sahm Rule recession indicator (FRED SAHMREALTIME). Values at or above
//! 0.50 mean the rule has triggered.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::{FactorIngestor, IngestorContext};

const SERIES: &str = "SAHMREALTIME";

pub struct SahmRuleIngestor {
    ctx: Arc<IngestorContext>,
}

impl SahmRuleIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_sahm(value: f64, trend: &str) -> f64 {
    if value >= 0.70 {
        -0.9
    } else if value >= 0.50 {
        -0.8
    } else if value >= 0.40 {
        -0.5
    } else if value >= 0.30 {
        -0.3
    } else if value >= 0.20 {
        if trend == "rising" {
            -0.1
        } else {
            0.0
        }
    } else if value >= 0.10 {
        if trend == "falling" {
            0.3
        } else {
            0.2
        }
    } else {
        0.5
    }
}

fn sahm_state(value: f64) -> &'static str {
    if value >= 0.50 {
        "RECESSION TRIGGERED"
    } else if value >= 0.30 {
        "warning"
    } else {
        "clear"
    }
}

#[async_trait]
impl FactorIngestor for SahmRuleIngestor {
    fn factor_id(&self) -> &'static str {
        "sahm_rule"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let mut current: Option<f64> = None;
        let mut trend = "stable".to_string();
        let mut source = "fred";
        let mut cache_fetched_at: Option<String> = None;

        if let Some(econ) = &self.ctx.econ {
            match econ.series(SERIES, 6).await {
                Ok(points) => {
                    if let Some(latest) = points.last() {
                        current = Some(latest.value);
                        if points.len() >= 2 {
                            let previous = points[points.len() - 2].value;
                            if latest.value > previous + 0.05 {
                                trend = "rising".to_string();
                            } else if latest.value < previous - 0.05 {
                                trend = "falling".to_string();
                            }
                        }
                        self.ctx
                            .store
                            .cache_snapshot(
                                SERIES,
                                &serde_json::json!({
                                    "value": latest.value,
                                    "trend": trend,
                                    "series": SERIES,
                                    "fetched_at": Utc::now().to_rfc3339(),
                                }),
                            )
                            .await;
                    }
                }
                Err(e) => tracing::warn!("sahm_rule: FRED fetch failed: {}", e),
            }
        }

        if current.is_none() {
            let cached = self.ctx.store.load_snapshot(SERIES).await?;
            current = cached.get("value").and_then(|v| v.as_f64());
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
                "sahm_rule: using cached FRED snapshot ({:?})",
                cache_fetched_at
            );
        }

        let current = current?;
        let score = score_sahm(current, &trend);
        let detail = format!(
            "Sahm Rule: {:.2} ({}, {})",
            current,
            sahm_state(current),
            trend
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), source)
                .with_raw_data(serde_json::json!({
                    "sahm_value": current,
                    "trend": trend,
                    "cached_fetched_at": cache_fetched_at,
                })),
        )
    }
}
