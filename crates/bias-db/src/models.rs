use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OpenSignalRow {
    pub signal_id: String,
    pub symbol: String,
    pub signal_type: String,
    pub direction: String,
    pub entry: f64,
    pub stop: f64,
    pub t1: f64,
    pub t2: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: String,
    pub sector: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PortfolioSummaryRow {
    pub equity: f64,
    pub cash: f64,
    pub open_positions: i64,
    pub unrealized_pnl: f64,
    pub snapshot_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OutcomeRow {
    pub signal_id: String,
    pub symbol: String,
    pub signal_type: String,
    pub direction: String,
    pub outcome: String,
    pub pnl_r: Option<f64>,
    pub recorded_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TradePnlRow {
    pub symbol: String,
    pub direction: String,
    pub pnl: f64,
    pub executed_at: String,
}
