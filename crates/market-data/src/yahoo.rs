use async_trait::async_trait;
use bias_core::{Bar, BiasError, MarketDataProvider};
use chrono::{DateTime, Duration, Utc};
use kv_store::{keys, KvStore};

use crate::retry::with_retries;
use crate::{HTTP_TIMEOUT_SECS, PRICE_CACHE_TTL_SECS};

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Daily-bar client over the Yahoo chart endpoint, with an optional
/// write-through KV cache keyed by (symbol, days).
#[derive(Clone)]
pub struct YahooClient {
    client: reqwest::Client,
    kv: Option<KvStore>,
}

impl YahooClient {
    pub fn new() -> Result<Self, BiasError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| BiasError::SourceError(format!("http client: {e}")))?;
        Ok(Self { client, kv: None })
    }

    pub fn with_cache(mut self, kv: KvStore) -> Self {
        self.kv = Some(kv);
        self
    }

    async fn fetch_chart(&self, symbol: &str, days: i64) -> Result<Vec<Bar>, BiasError> {
        let now = Utc::now();
        let period1 = (now - Duration::days(days)).timestamp();
        let period2 = now.timestamp();
        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d",
            CHART_URL, symbol, period1, period2
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BiasError::SourceError(format!("chart {symbol}: {e}")))?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BiasError::SourceError(format!("chart {symbol}: {e}")))?;

        parse_chart_response(&json)
    }
}

fn parse_chart_response(json: &serde_json::Value) -> Result<Vec<Bar>, BiasError> {
    let chart = json
        .get("chart")
        .and_then(|v| v.get("result"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| BiasError::SourceError("no chart data".to_string()))?;

    let timestamps = chart
        .get("timestamp")
        .and_then(|v| v.as_array())
        .ok_or_else(|| BiasError::SourceError("no timestamps".to_string()))?;

    let quote = chart
        .get("indicators")
        .and_then(|v| v.get("quote"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| BiasError::SourceError("no quote arrays".to_string()))?;

    let field = |name: &str| -> Result<&Vec<serde_json::Value>, BiasError> {
        quote
            .get(name)
            .and_then(|v| v.as_array())
            .ok_or_else(|| BiasError::SourceError(format!("no {name} prices")))
    };

    let opens = field("open")?;
    let highs = field("high")?;
    let lows = field("low")?;
    let closes = field("close")?;
    let volumes = field("volume")?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for i in 0..timestamps.len() {
        // Yahoo pads arrays with nulls on holidays; skip incomplete rows.
        if let (Some(ts), Some(o), Some(h), Some(l), Some(c)) = (
            timestamps[i].as_i64(),
            opens.get(i).and_then(|v| v.as_f64()),
            highs.get(i).and_then(|v| v.as_f64()),
            lows.get(i).and_then(|v| v.as_f64()),
            closes.get(i).and_then(|v| v.as_f64()),
        ) {
            let timestamp = DateTime::from_timestamp(ts, 0)
                .ok_or_else(|| BiasError::InvalidData(format!("bad timestamp {ts}")))?;
            bars.push(Bar {
                timestamp,
                open: o,
                high: h,
                low: l,
                close: c,
                volume: volumes.get(i).and_then(|v| v.as_f64()).unwrap_or(0.0),
            });
        }
    }

    if bars.is_empty() {
        return Err(BiasError::InsufficientData("empty chart".to_string()));
    }
    Ok(bars)
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn daily_bars(&self, symbol: &str, days: i64) -> Result<Vec<Bar>, BiasError> {
        let cache_key = keys::price_cache(symbol, days);

        if let Some(kv) = &self.kv {
            if let Ok(Some(bars)) = kv.get_json::<Vec<Bar>>(&cache_key).await {
                return Ok(bars);
            }
        }

        let bars = with_retries(&format!("yahoo chart {symbol}"), |_| {
            self.fetch_chart(symbol, days)
        })
        .await?;

        if let Some(kv) = &self.kv {
            if let Err(e) = kv.set_json_ex(&cache_key, &bars, PRICE_CACHE_TTL_SECS).await {
                tracing::warn!("Price cache write failed for {}: {}", symbol, e);
            }
        }

        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chart_skips_null_rows() {
        let json = serde_json::json!({
            "chart": {"result": [{
                "timestamp": [1700000000i64, 1700086400i64, 1700172800i64],
                "indicators": {"quote": [{
                    "open": [100.0, null, 102.0],
                    "high": [101.0, null, 103.5],
                    "low": [99.0, null, 101.0],
                    "close": [100.5, null, 103.0],
                    "volume": [1000000.0, null, 1200000.0]
                }]}
            }]}
        });
        let bars = parse_chart_response(&json).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 103.0);
    }

    #[test]
    fn test_parse_chart_rejects_empty() {
        let json = serde_json::json!({"chart": {"result": []}});
        assert!(parse_chart_response(&json).is_err());
    }
}
