//! Durable relational store for signals, factor readings, composite history,
//! outcomes and health records.

use bias_core::{
    BiasError, CompositeResult, Signal, SignalOutcome,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

mod models;

pub use models::{OpenSignalRow, OutcomeRow, PortfolioSummaryRow, TradePnlRow, WatchlistEntry};

fn db_err(err: sqlx::Error) -> BiasError {
    BiasError::DatabaseError(err.to_string())
}

#[derive(Clone)]
pub struct BiasDb {
    pool: SqlitePool,
}

impl BiasDb {
    /// Open (creating if missing) and apply the schema.
    pub async fn new(database_url: &str) -> Result<Self, BiasError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_err)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(2)
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), BiasError> {
        let schema = include_str!("../../../schema.sql");

        // sqlx does not execute multi-statement strings; split on ';'
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await.map_err(db_err)?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Factor readings
    // ------------------------------------------------------------------

    pub async fn insert_factor_reading(
        &self,
        reading: &bias_core::FactorReading,
    ) -> Result<(), BiasError> {
        let metadata = serde_json::json!({
            "raw_data": reading.raw_data,
            "metadata": reading.metadata,
        });
        sqlx::query(
            "INSERT INTO factor_readings (factor_id, timestamp, score, signal, source, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&reading.factor_id)
        .bind(reading.timestamp.to_rfc3339())
        .bind(reading.score)
        .bind(reading.signal.as_str())
        .bind(&reading.source)
        .bind(metadata.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Composite history
    // ------------------------------------------------------------------

    pub async fn insert_composite(&self, result: &CompositeResult) -> Result<(), BiasError> {
        let factor_scores: serde_json::Map<String, serde_json::Value> = result
            .factors
            .iter()
            .map(|(id, reading)| {
                let score = reading
                    .as_ref()
                    .map(|r| serde_json::json!(r.score))
                    .unwrap_or(serde_json::Value::Null);
                (id.clone(), score)
            })
            .collect();

        sqlx::query(
            "INSERT INTO bias_composite_history (
                composite_score, bias_level, bias_numeric, active_factors,
                stale_factors, velocity_multiplier, override_level, confidence,
                factor_scores, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(result.composite_score)
        .bind(result.bias_level.as_str())
        .bind(result.bias_numeric)
        .bind(serde_json::to_string(&result.active_factors).unwrap_or_default())
        .bind(serde_json::to_string(&result.stale_factors).unwrap_or_default())
        .bind(result.velocity_multiplier)
        .bind(result.override_level.map(|l| l.as_str()))
        .bind(result.confidence.as_str())
        .bind(serde_json::Value::Object(factor_scores).to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn composite_history_count(&self) -> Result<i64, BiasError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM bias_composite_history")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.get::<i64, _>("n"))
    }

    // ------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_signal(
        &self,
        signal: &Signal,
        bias_snapshot: Option<&serde_json::Value>,
        weekday: u32,
        hour_of_day: u32,
        opex_week: bool,
        days_to_earnings: Option<i64>,
        market_event: Option<&str>,
    ) -> Result<(), BiasError> {
        let payload = serde_json::to_string(signal)
            .map_err(|e| BiasError::DatabaseError(format!("serialize signal: {e}")))?;
        sqlx::query(
            "INSERT INTO signals (
                signal_id, symbol, signal_type, direction, priority, confidence,
                cta_zone, entry, stop, t1, t2, rr_ratio, payload, bias_snapshot,
                weekday, hour_of_day, opex_week, days_to_earnings, market_event,
                status, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'open', ?)",
        )
        .bind(&signal.signal_id)
        .bind(&signal.symbol)
        .bind(signal.signal_type.as_str())
        .bind(signal.direction.as_str())
        .bind(signal.priority)
        .bind(signal.confidence.as_str())
        .bind(signal.cta_zone.as_str())
        .bind(signal.setup.entry)
        .bind(signal.setup.stop)
        .bind(signal.setup.t1)
        .bind(signal.setup.t2)
        .bind(signal.setup.rr_ratio)
        .bind(payload)
        .bind(bias_snapshot.map(|v| v.to_string()))
        .bind(weekday as i64)
        .bind(hour_of_day as i64)
        .bind(opex_week as i64)
        .bind(days_to_earnings)
        .bind(market_event)
        .bind(signal.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn open_signals(&self) -> Result<Vec<OpenSignalRow>, BiasError> {
        sqlx::query_as::<_, OpenSignalRow>(
            "SELECT signal_id, symbol, signal_type, direction, entry, stop, t1, t2, created_at
             FROM signals WHERE status = 'open' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn close_signal(
        &self,
        signal_id: &str,
        outcome: SignalOutcome,
        exit_price: Option<f64>,
        bars_held: Option<i64>,
        pnl_r: Option<f64>,
    ) -> Result<(), BiasError> {
        sqlx::query(
            "INSERT INTO signal_outcomes (signal_id, outcome, exit_price, bars_held, pnl_r, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(signal_id)
        .bind(outcome.as_str())
        .bind(exit_price)
        .bind(bars_held)
        .bind(pnl_r)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("UPDATE signals SET status = 'closed' WHERE signal_id = ?")
            .bind(signal_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn recent_signals(&self, limit: i64) -> Result<Vec<serde_json::Value>, BiasError> {
        let rows = sqlx::query("SELECT payload FROM signals ORDER BY created_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| serde_json::from_str(&row.get::<String, _>("payload")).ok())
            .collect())
    }

    /// Recent signal outcomes joined back to their signals, newest first.
    pub async fn recent_outcomes(&self, limit: i64) -> Result<Vec<models::OutcomeRow>, BiasError> {
        sqlx::query_as::<_, models::OutcomeRow>(
            "SELECT o.signal_id, s.symbol, s.signal_type, s.direction, o.outcome, o.pnl_r, o.recorded_at
             FROM signal_outcomes o
             JOIN signals s ON s.signal_id = o.signal_id
             ORDER BY o.recorded_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    // ------------------------------------------------------------------
    // Watchlist
    // ------------------------------------------------------------------

    pub async fn watchlist(&self) -> Result<Vec<WatchlistEntry>, BiasError> {
        sqlx::query_as::<_, WatchlistEntry>(
            "SELECT symbol, sector FROM watchlist_tickers WHERE active = 1 ORDER BY symbol",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn add_watchlist_ticker(
        &self,
        symbol: &str,
        sector: Option<&str>,
    ) -> Result<(), BiasError> {
        sqlx::query(
            "INSERT INTO watchlist_tickers (symbol, sector, active, added_at)
             VALUES (?, ?, 1, ?)
             ON CONFLICT (symbol) DO UPDATE SET active = 1, sector = excluded.sector",
        )
        .bind(symbol.to_uppercase())
        .bind(sector)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn remove_watchlist_ticker(&self, symbol: &str) -> Result<(), BiasError> {
        sqlx::query("UPDATE watchlist_tickers SET active = 0 WHERE symbol = ?")
            .bind(symbol.to_uppercase())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Health / portfolio
    // ------------------------------------------------------------------

    pub async fn record_health(
        &self,
        component: &str,
        status: &str,
        detail: Option<&str>,
    ) -> Result<(), BiasError> {
        sqlx::query(
            "INSERT INTO strategy_health (component, status, detail, recorded_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(component)
        .bind(status)
        .bind(detail)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn insert_health_alert(
        &self,
        title: &str,
        message: &str,
        severity: &str,
    ) -> Result<(), BiasError> {
        sqlx::query(
            "INSERT INTO health_alerts (title, message, severity, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(title)
        .bind(message)
        .bind(severity)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn latest_portfolio_snapshot(
        &self,
    ) -> Result<Option<PortfolioSummaryRow>, BiasError> {
        sqlx::query_as::<_, PortfolioSummaryRow>(
            "SELECT equity, cash, open_positions, unrealized_pnl, snapshot_at
             FROM portfolio_snapshots ORDER BY snapshot_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    pub async fn insert_portfolio_snapshot(
        &self,
        equity: f64,
        cash: f64,
        open_positions: i64,
        unrealized_pnl: f64,
    ) -> Result<(), BiasError> {
        sqlx::query(
            "INSERT INTO portfolio_snapshots (equity, cash, open_positions, unrealized_pnl, snapshot_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(equity)
        .bind(cash)
        .bind(open_positions)
        .bind(unrealized_pnl)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn recent_trade_pnl(&self, since: DateTime<Utc>) -> Result<Vec<TradePnlRow>, BiasError> {
        sqlx::query_as::<_, TradePnlRow>(
            "SELECT symbol, direction, pnl, executed_at FROM trades
             WHERE executed_at >= ? AND pnl IS NOT NULL
             ORDER BY executed_at DESC",
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    // ------------------------------------------------------------------
    // Price history archive
    // ------------------------------------------------------------------

    pub async fn upsert_price_bar(&self, symbol: &str, bar: &bias_core::Bar) -> Result<(), BiasError> {
        sqlx::query(
            "INSERT INTO price_history (symbol, bar_date, open, high, low, close, volume)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (symbol, bar_date) DO UPDATE SET
                open = excluded.open, high = excluded.high, low = excluded.low,
                close = excluded.close, volume = excluded.volume",
        )
        .bind(symbol.to_uppercase())
        .bind(bar.timestamp.date_naive().to_string())
        .bind(bar.open)
        .bind(bar.high)
        .bind(bar.low)
        .bind(bar.close)
        .bind(bar.volume)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
