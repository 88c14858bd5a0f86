//! CTA strategy scanner: per-ticker indicator panel -> zone -> typed
//! signals with entry/stop/target, confluence scoring, per-ticker
//! cooldown, and sector-wind / bias-alignment enrichment.

use std::sync::Arc;

use bias_core::{
    BiasAlignment, BiasLevel, CompositeResult, CtaZone, Direction, MarketDataProvider, SectorWind,
    Signal,
};
use bias_db::BiasDb;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use kv_store::{keys, KvStore};

pub mod confluence;
pub mod indicators;
pub mod profiles;
pub mod rules;
pub mod sectors;
pub mod setup;
pub mod zones;

use indicators::IndicatorPanel;
use zones::cta_zone;

/// Tickers scanned when the watchlist table is empty.
pub const SEED_UNIVERSE: &[&str] = &[
    "SPY", "QQQ", "IWM", "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "AMD", "JPM",
    "V", "UNH", "XOM", "CAT", "LIN", "NEE",
];

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub lookback_days: i64,
    pub golden_touch_min_bars_above: usize,
    pub golden_touch_min_correction_pct: f64,
    pub golden_touch_max_correction_pct: f64,
    pub volume_breakout_threshold: f64,
    pub pullback_max_distance_pct: f64,
    pub cooldown_minutes: i64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            lookback_days: 365,
            golden_touch_min_bars_above: 50,
            golden_touch_min_correction_pct: 5.0,
            golden_touch_max_correction_pct: 12.0,
            volume_breakout_threshold: 1.10,
            pullback_max_distance_pct: 1.5,
            cooldown_minutes: 240,
        }
    }
}

pub struct Scanner {
    market: Arc<dyn MarketDataProvider>,
    db: BiasDb,
    kv: KvStore,
    config: ScannerConfig,
    cooldowns: DashMap<String, DateTime<Utc>>,
}

impl Scanner {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        db: BiasDb,
        kv: KvStore,
        config: ScannerConfig,
    ) -> Self {
        Self {
            market,
            db,
            kv,
            config,
            cooldowns: DashMap::new(),
        }
    }

    /// Run all signal rules for one ticker's panel and apply confluence.
    pub fn evaluate_panel(
        symbol: &str,
        panel: &IndicatorPanel,
        zone: CtaZone,
        prev_zone: CtaZone,
        config: &ScannerConfig,
    ) -> Vec<Signal> {
        let mut signals = Vec::new();

        if let Some(signal) = rules::check_golden_touch(symbol, panel, zone, config) {
            signals.push(signal);
        }
        if let Some(signal) = rules::check_two_close_volume(symbol, panel, zone, config) {
            signals.push(signal);
        }
        if let Some(signal) = rules::check_pullback_entry(symbol, panel, zone, config) {
            signals.push(signal);
        }
        if let Some(signal) = rules::check_zone_upgrade(symbol, panel, zone, prev_zone) {
            signals.push(signal);
        }
        if let Some(signal) = rules::check_trapped_longs(symbol, panel, zone) {
            signals.push(signal);
        }
        if let Some(signal) = rules::check_trapped_shorts(symbol, panel, zone) {
            signals.push(signal);
        }

        confluence::score_confluence(signals)
    }

    /// Fetch bars, compute the panel and evaluate rules for one symbol.
    /// Also records the symbol's CTA zone for sector-wind lookups.
    pub async fn scan_symbol(&self, symbol: &str) -> Vec<Signal> {
        let bars = match self.market.daily_bars(symbol, self.config.lookback_days).await {
            Ok(bars) => bars,
            Err(e) => {
                tracing::warn!("Scan {}: bar fetch failed: {}", symbol, e);
                return vec![];
            }
        };

        let Some(panel) = IndicatorPanel::compute(&bars) else {
            tracing::debug!("Scan {}: not enough bars for a panel", symbol);
            return vec![];
        };

        let zone = cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);
        let (prev_close, prev_sma20, prev_sma50, prev_sma120) = IndicatorPanel::prev_smas(&bars);
        let prev_zone = match prev_close {
            Some(prev_close) => cta_zone(prev_close, prev_sma20, prev_sma50, prev_sma120),
            None => CtaZone::Unknown,
        };

        if let Err(e) = self
            .kv
            .set_string_ex(&keys::cta_zone(symbol), zone.as_str(), 86_400)
            .await
        {
            tracing::debug!("Scan {}: zone cache write failed: {}", symbol, e);
        }

        let signals = Self::evaluate_panel(symbol, &panel, zone, prev_zone, &self.config);

        let mut emitted = Vec::new();
        for mut signal in signals {
            if !self.claim_cooldown(symbol, signal.signal_type.as_str()) {
                tracing::debug!(
                    "Scan {}: {} suppressed by cooldown",
                    symbol,
                    signal.signal_type
                );
                continue;
            }
            self.enrich(&mut signal).await;
            emitted.push(signal);
        }
        emitted
    }

    /// Scan the watchlist (seed universe when empty). Sector ETF zones are
    /// refreshed first so sector-wind lookups see fresh state.
    pub async fn scan(&self) -> Vec<Signal> {
        self.refresh_sector_zones().await;

        let symbols: Vec<String> = match self.db.watchlist().await {
            Ok(entries) if !entries.is_empty() => {
                entries.into_iter().map(|e| e.symbol).collect()
            }
            Ok(_) => SEED_UNIVERSE.iter().map(|s| s.to_string()).collect(),
            Err(e) => {
                tracing::warn!("Scan: watchlist load failed ({}), using seed universe", e);
                SEED_UNIVERSE.iter().map(|s| s.to_string()).collect()
            }
        };

        tracing::info!("Scanning {} tickers", symbols.len());
        let mut all_signals = Vec::new();
        for symbol in symbols {
            let mut signals = self.scan_symbol(&symbol).await;
            all_signals.append(&mut signals);
        }
        all_signals
    }

    /// Compute and cache the CTA zone for every sector ETF.
    pub async fn refresh_sector_zones(&self) {
        for (_, etf) in sectors::SECTOR_ETFS {
            match self.market.daily_bars(etf, self.config.lookback_days).await {
                Ok(bars) => {
                    if let Some(panel) = IndicatorPanel::compute(&bars) {
                        let zone = cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);
                        if let Err(e) = self
                            .kv
                            .set_string_ex(&keys::cta_zone(etf), zone.as_str(), 86_400)
                            .await
                        {
                            tracing::debug!("Zone cache write failed for {}: {}", etf, e);
                        }
                    }
                }
                Err(e) => tracing::debug!("Sector zone refresh failed for {}: {}", etf, e),
            }
        }
    }

    fn claim_cooldown(&self, symbol: &str, signal_type: &str) -> bool {
        let key = format!("{}:{}", symbol.to_uppercase(), signal_type);
        let now = Utc::now();
        if let Some(last) = self.cooldowns.get(&key) {
            if now - *last < Duration::minutes(self.config.cooldown_minutes) {
                return false;
            }
        }
        self.cooldowns.insert(key, now);
        true
    }

    /// Attach sector wind, composite-bias alignment and options-flow
    /// confirmation to an emitted signal.
    async fn enrich(&self, signal: &mut Signal) {
        signal.sector_wind = Some(self.sector_wind(&signal.symbol, signal.direction).await);
        signal.bias_alignment = Some(self.bias_alignment(signal.direction).await);
        self.attach_flow_context(signal).await;
    }

    async fn sector_wind(&self, symbol: &str, direction: Direction) -> SectorWind {
        let sector = sectors::detect_sector(symbol);
        let unknown = |etf: Option<&str>| SectorWind {
            sector: sector.to_string(),
            etf: etf.map(String::from),
            etf_zone: None,
            alignment: "UNKNOWN".to_string(),
        };

        if sector == "Uncategorized" {
            return unknown(None);
        }
        let Some(etf) = sectors::sector_etf(sector) else {
            return unknown(None);
        };

        let etf_zone = match self.kv.get_string(&keys::cta_zone(etf)).await {
            Ok(Some(raw)) => raw.parse::<CtaZone>().ok(),
            _ => None,
        };
        let Some(etf_zone) = etf_zone else {
            return unknown(Some(etf));
        };

        let alignment = match direction {
            Direction::Long if etf_zone.is_bullish() => "TAILWIND",
            Direction::Short if etf_zone.is_bearish() => "TAILWIND",
            Direction::Long if etf_zone.is_bearish() => "HEADWIND",
            Direction::Short if etf_zone.is_bullish() => "HEADWIND",
            _ => "NEUTRAL",
        };

        SectorWind {
            sector: sector.to_string(),
            etf: Some(etf.to_string()),
            etf_zone: Some(etf_zone),
            alignment: alignment.to_string(),
        }
    }

    async fn bias_alignment(&self, direction: Direction) -> BiasAlignment {
        let bias_level = match self
            .kv
            .get_json::<CompositeResult>(keys::COMPOSITE_LATEST)
            .await
        {
            Ok(Some(composite)) => composite.bias_level,
            _ => {
                return BiasAlignment {
                    bias: BiasLevel::Neutral,
                    alignment: "UNKNOWN".to_string(),
                    conviction_mult: 1.0,
                }
            }
        };

        let (alignment, conviction_mult) = match direction {
            Direction::Long if bias_level.is_bullish() => ("ALIGNED", 1.2),
            Direction::Short if bias_level.is_bearish() => ("ALIGNED", 1.2),
            _ if bias_level == BiasLevel::Neutral => ("NEUTRAL", 1.0),
            _ => ("COUNTER_TREND", 0.8),
        };

        BiasAlignment {
            bias: bias_level,
            alignment: alignment.to_string(),
            conviction_mult,
        }
    }

    /// Merge options-flow confirmation/conflict into the signal context.
    async fn attach_flow_context(&self, signal: &mut Signal) {
        let flow = match self
            .kv
            .get_json::<serde_json::Value>(&keys::uw_flow(&signal.symbol))
            .await
        {
            Ok(Some(flow)) => flow,
            _ => return,
        };

        let sentiment = flow
            .get("sentiment")
            .and_then(|v| v.as_str())
            .unwrap_or("NEUTRAL")
            .to_string();
        let net_premium = flow.get("net_premium").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let unusual_count = flow.get("unusual_count").and_then(|v| v.as_i64()).unwrap_or(0);

        let mut flow_context = serde_json::json!({
            "sentiment": sentiment,
            "net_premium": net_premium,
            "unusual_count": unusual_count,
        });

        match (signal.direction, sentiment.as_str()) {
            (Direction::Long, "BULLISH") => {
                flow_context["confirmation"] = serde_json::json!(format!(
                    "Bullish flow (${:.0} net calls, {} unusual trades)",
                    net_premium, unusual_count
                ));
            }
            (Direction::Short, "BEARISH") => {
                flow_context["confirmation"] = serde_json::json!(format!(
                    "Bearish flow (${:.0} net puts, {} unusual trades)",
                    net_premium.abs(),
                    unusual_count
                ));
            }
            (Direction::Long, "BEARISH") => {
                flow_context["conflict"] =
                    serde_json::json!("Heavy put buying despite bullish technical setup");
            }
            (Direction::Short, "BULLISH") => {
                flow_context["conflict"] =
                    serde_json::json!("Heavy call buying despite bearish technical setup");
            }
            _ => {}
        }

        if let Some(context) = signal.context.as_object_mut() {
            context.insert("uw_flow".to_string(), flow_context);
        }
    }
}

#[cfg(test)]
mod tests;
