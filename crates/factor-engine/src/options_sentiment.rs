//! Options sentiment from Market Tide webhooks. Contrarian at consensus
//! extremes, directional at moderate readings; net premium acts as a
//! small secondary modifier.

use std::sync::Arc;

use async_trait::async_trait;
use bias_core::{clamp_score, FactorReading, TimestampSource};
use kv_store::keys;

use crate::webhook::extract_source_timestamp;
use crate::{FactorIngestor, IngestorContext};

pub struct OptionsSentimentIngestor {
    ctx: Arc<IngestorContext>,
}

impl OptionsSentimentIngestor {
    pub fn new(ctx: Arc<IngestorContext>) -> Self {
        Self { ctx }
    }
}

pub fn score_market_tide(
    sentiment: &str,
    bullish_pct: Option<f64>,
    bearish_pct: Option<f64>,
    call_premium: f64,
    put_premium: f64,
) -> f64 {
    let mut score = match (bullish_pct, bearish_pct) {
        (Some(bull), Some(bear)) => {
            if bull >= 70.0 {
                // Extreme bullish consensus: contrarian bearish
                -0.3 - (bull - 70.0) / 100.0
            } else if bear >= 70.0 {
                // Extreme bearish consensus: contrarian bullish
                0.3 + (bear - 70.0) / 100.0
            } else {
                (bull - bear) / 200.0
            }
        }
        _ => match sentiment {
            "STRONGLY_BULLISH" => -0.4,
            "BULLISH" => 0.2,
            "BEARISH" => -0.2,
            "STRONGLY_BEARISH" => 0.4,
            _ => 0.0,
        },
    };

    if call_premium > 0.0 && put_premium > 0.0 {
        let total = call_premium + put_premium;
        let net_ratio = (call_premium - put_premium) / total;
        let premium_mod = if net_ratio.abs() > 0.6 {
            -net_ratio * 0.15
        } else {
            net_ratio * 0.1
        };
        score += premium_mod;
    }

    clamp_score(score)
}

#[async_trait]
impl FactorIngestor for OptionsSentimentIngestor {
    fn factor_id(&self) -> &'static str {
        "options_sentiment"
    }

    async fn compute(&self) -> Option<FactorReading> {
        let payload = match self
            .ctx
            .store
            .kv()
            .get_json::<serde_json::Value>(keys::MARKET_TIDE)
            .await
        {
            Ok(Some(payload)) => payload,
            _ => {
                tracing::warn!("Options sentiment: no Market Tide data, excluding from composite");
                return None;
            }
        };

        let sentiment = payload
            .get("sentiment")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_uppercase();
        let bullish_pct = payload.get("bullish_pct").and_then(|v| v.as_f64());
        let bearish_pct = payload.get("bearish_pct").and_then(|v| v.as_f64());
        let call_premium = payload
            .get("call_premium")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let put_premium = payload
            .get("put_premium")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);

        let score = score_market_tide(&sentiment, bullish_pct, bearish_pct, call_premium, put_premium);

        let mut parts = vec![format!("Sentiment: {sentiment}")];
        if let Some(bull) = bullish_pct {
            parts.push(format!("Bull {bull:.0}%"));
        }
        if let Some(bear) = bearish_pct {
            parts.push(format!("Bear {bear:.0}%"));
        }
        if call_premium != 0.0 || put_premium != 0.0 {
            let net = call_premium - put_premium;
            parts.push(format!(
                "Net premium: {} ${:.0}",
                if net > 0.0 { "call" } else { "put" },
                net.abs()
            ));
        }
        let detail = parts.join(", ");

        let (timestamp, ts_source) = extract_source_timestamp(&payload);
        if ts_source == TimestampSource::Fallback {
            tracing::warn!("No source timestamp for options_sentiment, using wall-clock fallback");
        }

        Some(
            FactorReading::new(self.factor_id(), score, detail, timestamp, "unusual_whales")
                .with_raw_data(payload)
                .with_timestamp_source(ts_source),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contrarian_at_extremes() {
        // 80% bullish consensus scores bearish
        let score = score_market_tide("BULLISH", Some(80.0), Some(10.0), 0.0, 0.0);
        assert!((score - (-0.4)).abs() < 1e-9);

        // 80% bearish consensus scores bullish
        let score = score_market_tide("BEARISH", Some(10.0), Some(80.0), 0.0, 0.0);
        assert!((score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_moderate_follows_tide() {
        let score = score_market_tide("NEUTRAL", Some(60.0), Some(30.0), 0.0, 0.0);
        assert!((score - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_label_fallback_without_percentages() {
        assert_eq!(score_market_tide("STRONGLY_BULLISH", None, None, 0.0, 0.0), -0.4);
        assert_eq!(score_market_tide("BULLISH", None, None, 0.0, 0.0), 0.2);
        assert_eq!(score_market_tide("NEUTRAL", None, None, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_premium_modifier() {
        // Moderate net call premium follows
        let balanced = score_market_tide("NEUTRAL", Some(50.0), Some(50.0), 600.0, 400.0);
        assert!(balanced > 0.0);
        // Extreme one-sided premium is contrarian
        let extreme = score_market_tide("NEUTRAL", Some(50.0), Some(50.0), 950.0, 50.0);
        assert!(extreme < 0.0);
    }
}
