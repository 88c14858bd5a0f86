use async_trait::async_trait;
use bias_core::{BiasError, IvSkewSnapshot, OptionsDataProvider};

use crate::retry::with_retries;
use crate::HTTP_TIMEOUT_SECS;

const OPTIONS_URL: &str = "https://query2.finance.yahoo.com/v7/finance/options";

/// Options-chain summary client over the Yahoo options endpoint.
/// Only the nearest expiration chain is inspected; near-the-money is
/// defined as strikes within 5% of the underlying.
#[derive(Clone)]
pub struct YahooOptionsClient {
    client: reqwest::Client,
}

impl YahooOptionsClient {
    pub fn new() -> Result<Self, BiasError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| BiasError::SourceError(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch_chain(&self, symbol: &str) -> Result<serde_json::Value, BiasError> {
        let url = format!("{}/{}", OPTIONS_URL, symbol);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BiasError::SourceError(format!("options {symbol}: {e}")))?;
        response
            .json()
            .await
            .map_err(|e| BiasError::SourceError(format!("options {symbol}: {e}")))
    }
}

struct ChainSummary {
    call_volume: f64,
    put_volume: f64,
    call_iv: Option<f64>,
    put_iv: Option<f64>,
}

fn summarize_chain(json: &serde_json::Value) -> Result<ChainSummary, BiasError> {
    let result = json
        .get("optionChain")
        .and_then(|v| v.get("result"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| BiasError::SourceError("no option chain".to_string()))?;

    let spot = result
        .get("quote")
        .and_then(|q| q.get("regularMarketPrice"))
        .and_then(|v| v.as_f64())
        .ok_or_else(|| BiasError::SourceError("no underlying price".to_string()))?;

    let options = result
        .get("options")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| BiasError::SourceError("no expirations".to_string()))?;

    let ntm = |contract: &serde_json::Value| -> bool {
        contract
            .get("strike")
            .and_then(|v| v.as_f64())
            .map(|strike| (strike - spot).abs() / spot <= 0.05)
            .unwrap_or(false)
    };

    let mut summary = ChainSummary {
        call_volume: 0.0,
        put_volume: 0.0,
        call_iv: None,
        put_iv: None,
    };

    let mut call_ivs = Vec::new();
    let mut put_ivs = Vec::new();

    for (side, volumes, ivs) in [
        ("calls", &mut summary.call_volume, &mut call_ivs),
        ("puts", &mut summary.put_volume, &mut put_ivs),
    ] {
        if let Some(contracts) = options.get(side).and_then(|v| v.as_array()) {
            for contract in contracts {
                if let Some(volume) = contract.get("volume").and_then(|v| v.as_f64()) {
                    *volumes += volume;
                }
                if ntm(contract) {
                    if let Some(iv) = contract.get("impliedVolatility").and_then(|v| v.as_f64()) {
                        ivs.push(iv);
                    }
                }
            }
        }
    }

    let mean = |values: &[f64]| -> Option<f64> {
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    };
    summary.call_iv = mean(&call_ivs);
    summary.put_iv = mean(&put_ivs);

    Ok(summary)
}

#[async_trait]
impl OptionsDataProvider for YahooOptionsClient {
    async fn put_call_volume_ratio(&self, symbol: &str) -> Result<Option<f64>, BiasError> {
        let json = with_retries(&format!("options chain {symbol}"), |_| {
            self.fetch_chain(symbol)
        })
        .await?;
        let summary = summarize_chain(&json)?;
        if summary.call_volume <= 0.0 {
            return Ok(None);
        }
        Ok(Some(summary.put_volume / summary.call_volume))
    }

    async fn iv_skew(&self, symbol: &str) -> Result<Option<IvSkewSnapshot>, BiasError> {
        let json = with_retries(&format!("options chain {symbol}"), |_| {
            self.fetch_chain(symbol)
        })
        .await?;
        let summary = summarize_chain(&json)?;
        match (summary.put_iv, summary.call_iv) {
            (Some(put_iv), Some(call_iv)) => Ok(Some(IvSkewSnapshot {
                put_iv,
                call_iv,
                skew: put_iv - call_iv,
            })),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chain() -> serde_json::Value {
        serde_json::json!({
            "optionChain": {"result": [{
                "quote": {"regularMarketPrice": 100.0},
                "options": [{
                    "calls": [
                        {"strike": 100.0, "volume": 500.0, "impliedVolatility": 0.18},
                        {"strike": 120.0, "volume": 100.0, "impliedVolatility": 0.30}
                    ],
                    "puts": [
                        {"strike": 99.0, "volume": 900.0, "impliedVolatility": 0.22},
                        {"strike": 80.0, "volume": 300.0, "impliedVolatility": 0.40}
                    ]
                }]
            }]}
        })
    }

    #[test]
    fn test_summarize_chain_volumes_and_ntm_iv() {
        let summary = summarize_chain(&sample_chain()).unwrap();
        assert_eq!(summary.call_volume, 600.0);
        assert_eq!(summary.put_volume, 1200.0);
        // Only NTM strikes (within 5%) feed the IV averages
        assert_eq!(summary.call_iv, Some(0.18));
        assert_eq!(summary.put_iv, Some(0.22));
    }
}
