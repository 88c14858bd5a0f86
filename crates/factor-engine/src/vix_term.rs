//! VIX term structure (VIX/VIX3M). Backwardation (ratio >= 1) signals
//! near-term fear exceeding longer-dated expectations. Falls back to a
//! degraded VIX-only score when VIX3M is unavailable rather than posting
//! nothing.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::{clamp_score, FactorReading};
use chrono::Utc;

use crate::{FactorIngestor, IngestorContext};

pub struct VixTermIngestor {
    ctx: Arc<IngestorContext>,
}

impl VixTermIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_vix_term(ratio: f64, vix: f64) -> f64 {
    let term_score = if ratio >= 1.10 {
        -1.0
    } else if ratio >= 1.0 {
        -0.6
    } else if ratio >= 0.95 {
        -0.2
    } else if ratio >= 0.85 {
        0.2
    } else {
        0.6
    };

    let level_mod = if vix >= 30.0 {
        -0.3
    } else if vix >= 25.0 {
        -0.2
    } else if vix >= 20.0 {
        -0.1
    } else if vix <= 12.0 {
        0.1
    } else {
        0.0
    };

    clamp_score(term_score + level_mod)
}

/// Degraded scoring from absolute VIX only. Less precise than the full
/// ratio but better than excluding the factor.
pub fn score_vix_only_fallback(vix: f64) -> f64 {
    if vix >= 35.0 {
        -0.8
    } else if vix >= 30.0 {
        -0.5
    } else if vix >= 25.0 {
        -0.3
    } else if vix >= 20.0 {
        -0.1
    } else if vix >= 15.0 {
        0.1
    } else if vix >= 12.0 {
        0.3
    } else {
        0.5
    }
}

#[async_trait]
impl FactorIngestor for VixTermIngestor {
    fn factor_id(&self) -> &'static str {
        "vix_term"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let vix = match self.ctx.market.latest_price("^VIX").await {
            Ok(Some(vix)) => vix,
            _ => {
                tracing::warn!("VIX term: VIX unavailable, cannot compute");
                return None;
            }
        };

        let vix3m = self.ctx.market.latest_price("^VIX3M").await.ok().flatten();

        match vix3m {
            Some(vix3m) if vix3m > 0.0 => {
                let ratio = vix / vix3m;
                let score = score_vix_term(ratio, vix);
                let detail = format!("VIX {:.1} / VIX3M {:.1} = {:.3}", vix, vix3m, ratio);
                Some(
                    FactorReading::new(self.factor_id(), score, detail, Utc::now(), "yfinance")
                        .with_raw_data(serde_json::json!({
                            "vix": vix,
                            "vix3m": vix3m,
                            "ratio": ratio,
                        })),
                )
            }
            _ => {
                tracing::warn!("VIX3M unavailable, using VIX-only fallback (VIX={:.1})", vix);
                let score = score_vix_only_fallback(vix);
                let detail = format!("VIX {:.1} (VIX3M unavailable, VIX-only fallback)", vix);
                Some(
                    FactorReading::new(self.factor_id(), score, detail, Utc::now(), "yfinance")
                        .with_raw_data(serde_json::json!({
                            "vix": vix,
                            "vix3m": null,
                            "ratio": null,
                            "degraded": true,
                        })),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_bands() {
        // Backwardation is bearish regardless of level modifier
        assert_eq!(score_vix_term(1.15, 15.0), -1.0);
        assert_eq!(score_vix_term(1.05, 15.0), -0.6);
        assert_eq!(score_vix_term(0.97, 15.0), -0.2);
        assert_eq!(score_vix_term(0.90, 15.0), 0.2);
        assert_eq!(score_vix_term(0.80, 15.0), 0.6);
    }

    #[test]
    fn test_level_modifier() {
        // Contango but elevated VIX drags the score down
        assert!((score_vix_term(0.90, 32.0) - (-0.1)).abs() < 1e-9);
        // Very low VIX adds a touch of bullishness
        assert!((score_vix_term(0.80, 11.0) - 0.7).abs() < 1e-9);
        // Combined extremes still clamp
        assert_eq!(score_vix_term(1.2, 40.0), -1.0);
    }

    #[test]
    fn test_vix_only_fallback_bands() {
        assert_eq!(score_vix_only_fallback(36.0), -0.8);
        assert_eq!(score_vix_only_fallback(31.0), -0.5);
        assert_eq!(score_vix_only_fallback(22.0), -0.1);
        assert_eq!(score_vix_only_fallback(16.0), 0.1);
        assert_eq!(score_vix_only_fallback(13.0), 0.3);
        assert_eq!(score_vix_only_fallback(11.0), 0.5);
    }
}
