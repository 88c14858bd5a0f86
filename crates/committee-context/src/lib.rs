//! Committee context assembler: gathers the bias snapshot, a technical
//! snapshot for the signal's ticker, the derived market calendar, a
//! portfolio summary, recent P&L and outcome-based feedback into one typed
//! packet handed to the downstream committee.

use std::sync::Arc;

use bias_core::{CompositeResult, CtaZone, MarketDataProvider, Signal};
use bias_db::{BiasDb, TradePnlRow};
use chrono::{DateTime, Duration, Utc};
use cta_scanner::indicators::IndicatorPanel;
use cta_scanner::zones::cta_zone;
use kv_store::{keys, KvStore};
use serde::{Deserialize, Serialize};

pub mod calendar;

pub use calendar::{is_opex_week, third_friday, upcoming_events, CalendarEvent};

/// Indicator state for the signal's ticker at assembly time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub symbol: String,
    pub close: f64,
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma120: Option<f64>,
    pub sma200: Option<f64>,
    pub atr: Option<f64>,
    pub rsi: Option<f64>,
    pub adx: Option<f64>,
    pub cta_zone: CtaZone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub equity: f64,
    pub cash: f64,
    pub open_positions: i64,
    pub unrealized_pnl: f64,
    pub as_of: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentPnl {
    pub total: f64,
    pub wins: usize,
    pub losses: usize,
    pub trades: Vec<TradePnlRow>,
}

/// Everything the committee needs to reason about one signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteePacket {
    pub signal: Option<Signal>,
    pub bias: Option<CompositeResult>,
    pub technical: Option<TechnicalSnapshot>,
    pub calendar: Vec<CalendarEvent>,
    pub portfolio: Option<PortfolioSummary>,
    pub recent_pnl: RecentPnl,
    pub feedback_notes: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

pub struct ContextAssembler {
    market: Arc<dyn MarketDataProvider>,
    db: BiasDb,
    kv: KvStore,
}

impl ContextAssembler {
    pub fn new(market: Arc<dyn MarketDataProvider>, db: BiasDb, kv: KvStore) -> Self {
        Self { market, db, kv }
    }

    pub async fn build_packet(&self, signal: Option<&Signal>) -> CommitteePacket {
        let bias = self
            .kv
            .get_json::<CompositeResult>(keys::COMPOSITE_LATEST)
            .await
            .ok()
            .flatten();

        let technical = match signal {
            Some(signal) => self.technical_snapshot(&signal.symbol).await,
            None => self.technical_snapshot("SPY").await,
        };

        let now = Utc::now();
        let calendar = upcoming_events(now.date_naive(), 30);

        let portfolio = match self.db.latest_portfolio_snapshot().await {
            Ok(Some(row)) => Some(PortfolioSummary {
                equity: row.equity,
                cash: row.cash,
                open_positions: row.open_positions,
                unrealized_pnl: row.unrealized_pnl,
                as_of: row.snapshot_at,
            }),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Committee context: portfolio load failed: {}", e);
                None
            }
        };

        let recent_pnl = self.recent_pnl(now).await;
        let feedback_notes = self.feedback_notes().await;

        CommitteePacket {
            signal: signal.cloned(),
            bias,
            technical,
            calendar,
            portfolio,
            recent_pnl,
            feedback_notes,
            generated_at: now,
        }
    }

    async fn technical_snapshot(&self, symbol: &str) -> Option<TechnicalSnapshot> {
        let bars = match self.market.daily_bars(symbol, 365).await {
            Ok(bars) => bars,
            Err(e) => {
                tracing::warn!("Committee context: bars for {} failed: {}", symbol, e);
                return None;
            }
        };
        let panel = IndicatorPanel::compute(&bars)?;
        let zone = cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);

        Some(TechnicalSnapshot {
            symbol: symbol.to_string(),
            close: panel.close,
            sma20: panel.sma20,
            sma50: panel.sma50,
            sma120: panel.sma120,
            sma200: panel.sma200,
            atr: panel.atr,
            rsi: panel.rsi,
            adx: panel.adx,
            cta_zone: zone,
        })
    }

    async fn recent_pnl(&self, now: DateTime<Utc>) -> RecentPnl {
        let since = now - Duration::days(7);
        match self.db.recent_trade_pnl(since).await {
            Ok(trades) => {
                let total = trades.iter().map(|t| t.pnl).sum();
                let wins = trades.iter().filter(|t| t.pnl > 0.0).count();
                let losses = trades.iter().filter(|t| t.pnl < 0.0).count();
                RecentPnl {
                    total,
                    wins,
                    losses,
                    trades,
                }
            }
            Err(e) => {
                tracing::warn!("Committee context: recent P&L load failed: {}", e);
                RecentPnl::default()
            }
        }
    }

    /// Outcome-derived lessons, e.g. repeated stop-outs for one setup type.
    async fn feedback_notes(&self) -> Vec<String> {
        let outcomes = match self.db.recent_outcomes(20).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Committee context: outcomes load failed: {}", e);
                return vec![];
            }
        };

        let mut notes = Vec::new();
        for row in &outcomes {
            let note = match row.outcome.as_str() {
                "hit_stop" => format!(
                    "{} {} on {} stopped out{}",
                    row.direction,
                    row.signal_type,
                    row.symbol,
                    row.pnl_r
                        .map(|r| format!(" ({r:+.1}R)"))
                        .unwrap_or_default()
                ),
                "hit_t2" => format!(
                    "{} {} on {} reached T2{}",
                    row.direction,
                    row.signal_type,
                    row.symbol,
                    row.pnl_r
                        .map(|r| format!(" ({r:+.1}R)"))
                        .unwrap_or_default()
                ),
                _ => continue,
            };
            notes.push(note);
            if notes.len() >= 5 {
                break;
            }
        }
        notes
    }
}
