//! Intraday UVOL/DVOL breadth. Webhook-fed and scored here, but not a
//! member of the composite's closed factor set; the reading is surfaced
//! via the status API only.

use bias_core::FactorReading;
use factor_store::FactorStore;
use kv_store::keys;

use crate::webhook::extract_source_timestamp;

pub fn score_breadth_ratio(ratio: f64) -> f64 {
    if ratio >= 3.0 {
        0.8
    } else if ratio >= 2.0 {
        0.6
    } else if ratio >= 1.5 {
        0.3
    } else if ratio >= 0.9 {
        0.0
    } else if ratio >= 0.6 {
        -0.3
    } else if ratio >= 0.4 {
        -0.6
    } else {
        -0.8
    }
}

pub async fn compute(store: &FactorStore) -> Option<FactorReading> {
    let payload = store
        .kv()
        .get_json::<serde_json::Value>(keys::BREADTH_UVOL_DVOL)
        .await
        .ok()
        .flatten()?;

    let ratio = payload.get("ratio").and_then(|v| v.as_f64())?;
    if ratio <= 0.0 {
        return None;
    }

    let score = score_breadth_ratio(ratio);
    let (timestamp, ts_source) = extract_source_timestamp(&payload);

    let detail = format!(
        "UVOL/DVOL {:.2} ({})",
        ratio,
        if ratio >= 2.0 {
            "breadth thrust"
        } else if ratio <= 0.5 {
            "heavy selling"
        } else {
            "mixed"
        }
    );

    Some(
        FactorReading::new("breadth_intraday", score, detail, timestamp, "tradingview")
            .with_raw_data(payload)
            .with_timestamp_source(ts_source),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(score_breadth_ratio(3.5), 0.8);
        assert_eq!(score_breadth_ratio(2.2), 0.6);
        assert_eq!(score_breadth_ratio(1.7), 0.3);
        assert_eq!(score_breadth_ratio(1.0), 0.0);
        assert_eq!(score_breadth_ratio(0.7), -0.3);
        assert_eq!(score_breadth_ratio(0.5), -0.6);
        assert_eq!(score_breadth_ratio(0.3), -0.8);
    }
}
