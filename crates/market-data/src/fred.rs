use async_trait::async_trait;
use bias_core::{BiasError, EconomicDataProvider, SeriesPoint};
use chrono::NaiveDate;

use crate::retry::with_retries;
use crate::HTTP_TIMEOUT_SECS;

const FRED_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

/// FRED observations client. Missing values come back as "." and are
/// dropped, matching the dropna behavior expected by the scorers.
#[derive(Clone)]
pub struct FredClient {
    client: reqwest::Client,
    api_key: String,
}

impl FredClient {
    pub fn new(api_key: String) -> Result<Self, BiasError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| BiasError::SourceError(format!("http client: {e}")))?;
        Ok(Self { client, api_key })
    }

    async fn fetch_series(&self, series_id: &str, limit: usize) -> Result<Vec<SeriesPoint>, BiasError> {
        let url = format!(
            "{}?series_id={}&api_key={}&file_type=json&sort_order=desc&limit={}",
            FRED_URL, series_id, self.api_key, limit
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BiasError::SourceError(format!("fred {series_id}: {e}")))?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BiasError::SourceError(format!("fred {series_id}: {e}")))?;

        parse_observations(&json)
    }
}

fn parse_observations(json: &serde_json::Value) -> Result<Vec<SeriesPoint>, BiasError> {
    let observations = json
        .get("observations")
        .and_then(|v| v.as_array())
        .ok_or_else(|| BiasError::SourceError("no observations".to_string()))?;

    let mut points = Vec::with_capacity(observations.len());
    for obs in observations {
        let date = obs.get("date").and_then(|v| v.as_str());
        let value = obs.get("value").and_then(|v| v.as_str());
        if let (Some(date), Some(value)) = (date, value) {
            if value == "." {
                continue;
            }
            if let (Ok(date), Ok(value)) = (
                NaiveDate::parse_from_str(date, "%Y-%m-%d"),
                value.parse::<f64>(),
            ) {
                points.push(SeriesPoint { date, value });
            }
        }
    }

    if points.is_empty() {
        return Err(BiasError::InsufficientData("empty series".to_string()));
    }

    // API returns newest first; callers expect oldest first.
    points.sort_by_key(|p| p.date);
    Ok(points)
}

#[async_trait]
impl EconomicDataProvider for FredClient {
    async fn series(&self, series_id: &str, limit: usize) -> Result<Vec<SeriesPoint>, BiasError> {
        with_retries(&format!("fred {series_id}"), |_| {
            self.fetch_series(series_id, limit)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_observations_drops_missing() {
        let json = serde_json::json!({
            "observations": [
                {"date": "2026-07-25", "value": "0.52"},
                {"date": "2026-07-24", "value": "."},
                {"date": "2026-07-23", "value": "0.48"}
            ]
        });
        let points = parse_observations(&json).unwrap();
        assert_eq!(points.len(), 2);
        // Oldest first after sort
        assert_eq!(points[0].value, 0.48);
        assert_eq!(points[1].value, 0.52);
    }

    #[test]
    fn test_parse_observations_empty_errors() {
        let json = serde_json::json!({"observations": []});
        assert!(parse_observations(&json).is_err());
    }
}
