use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::BiasError;
use crate::types::Bar;

/// One observation of an economic time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Near-the-money implied volatility summary for one underlying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvSkewSnapshot {
    pub put_iv: f64,
    pub call_iv: f64,
    /// put_iv - call_iv in vol points; positive = puts bid.
    pub skew: f64,
}

/// Daily OHLCV source. Implementations wrap a concrete provider; ingestors
/// and the scanner only ever see this trait so they can be tested against
/// fakes.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch up to `days` of daily bars, oldest first.
    async fn daily_bars(&self, symbol: &str, days: i64) -> Result<Vec<Bar>, BiasError>;

    /// Latest close for a symbol, if any bars exist.
    async fn latest_price(&self, symbol: &str) -> Result<Option<f64>, BiasError> {
        let bars = self.daily_bars(symbol, 5).await?;
        Ok(bars.last().map(|b| b.close))
    }
}

/// Economic series source (FRED-like).
#[async_trait]
pub trait EconomicDataProvider: Send + Sync {
    /// Most recent observations, oldest first.
    async fn series(&self, series_id: &str, limit: usize) -> Result<Vec<SeriesPoint>, BiasError>;
}

/// Options chain summary source.
#[async_trait]
pub trait OptionsDataProvider: Send + Sync {
    /// Put volume / call volume for the underlying's near-dated chain.
    async fn put_call_volume_ratio(&self, symbol: &str) -> Result<Option<f64>, BiasError>;

    /// NTM 7-45 DTE put-minus-call IV summary.
    async fn iv_skew(&self, symbol: &str) -> Result<Option<IvSkewSnapshot>, BiasError>;
}
