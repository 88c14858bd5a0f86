//! SPY near-the-money IV skew (put IV minus call IV, 7-45 DTE). Puts
//! heavily bid over calls signals hedging demand and stress; the most
//! extreme stretch eases back as positioning gets one-sided.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::FactorReading;
use chrono::Utc;

use crate::{FactorIngestor, IngestorContext};

pub struct IvSkewIngestor {
    ctx: Arc<IngestorContext>,
}

impl IvSkewIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

/// `skew_pts` is put IV minus call IV in vol points (e.g. 0.04 IV -> 4.0).
pub fn score_iv_skew(skew_pts: f64) -> f64 {
    if skew_pts >= 8.0 {
        -0.5
    } else if skew_pts >= 6.0 {
        -0.7
    } else if skew_pts >= 4.0 {
        -0.5
    } else if skew_pts >= 2.5 {
        -0.3
    } else if skew_pts >= 1.5 {
        -0.1
    } else if skew_pts >= 0.5 {
        0.0
    } else if skew_pts >= -0.5 {
        0.2
    } else {
        0.4
    }
}

#[async_trait]
impl FactorIngestor for IvSkewIngestor {
    fn factor_id(&self) -> &'static str {
        "iv_skew"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let options = self.ctx.options.as_ref()?;
        let snapshot = match options.iv_skew("SPY").await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::warn!("iv_skew: no NTM IV data, excluding from composite");
                return None;
            }
            Err(e) => {
                tracing::warn!("iv_skew: chain fetch failed: {}", e);
                return None;
            }
        };

        let skew_pts = snapshot.skew * 100.0;
        let score = score_iv_skew(skew_pts);
        let detail = format!(
            "SPY IV skew: put {:.1} vs call {:.1} ({:+.1} pts)",
            snapshot.put_iv * 100.0,
            snapshot.call_iv * 100.0,
            skew_pts
        );

        Some(
            FactorReading::new(self.factor_id(), score, detail, Utc::now(), "polygon")
                .with_raw_data(serde_json::json!({
                    "put_iv": snapshot.put_iv,
                    "call_iv": snapshot.call_iv,
                    "skew_pts": skew_pts,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(score_iv_skew(7.0), -0.7);
        assert_eq!(score_iv_skew(5.0), -0.5);
        assert_eq!(score_iv_skew(3.0), -0.3);
        assert_eq!(score_iv_skew(2.0), -0.1);
        assert_eq!(score_iv_skew(1.0), 0.0);
        assert_eq!(score_iv_skew(0.0), 0.2);
        assert_eq!(score_iv_skew(-1.0), 0.4);
    }

    #[test]
    fn test_extreme_stretch_eases_back() {
        assert_eq!(score_iv_skew(9.0), -0.5);
        assert!(score_iv_skew(9.0) > score_iv_skew(6.5));
    }
}
