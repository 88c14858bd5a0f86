//! The six typed signal rules. Each rule inspects the indicator panel for
//! one ticker's latest bar and returns a fully-built signal when its
//! conditions line up.

use bias_core::{Confidence, CtaZone, Direction, Signal, SignalType};
use chrono::Utc;
use uuid::Uuid;

use crate::indicators::IndicatorPanel;
use crate::setup::{build_signal_setup, round2, SmaLevels};
use crate::ScannerConfig;

fn sma_levels(panel: &IndicatorPanel) -> SmaLevels {
    SmaLevels {
        sma20: panel.sma20,
        sma50: panel.sma50,
        sma120: panel.sma120,
        sma200: panel.sma200,
    }
}

fn new_signal(
    symbol: &str,
    signal_type: SignalType,
    direction: Direction,
    priority: i32,
    description: String,
    zone: CtaZone,
    panel: &IndicatorPanel,
    atr: f64,
    invalidation_level: Option<f64>,
    invalidation_reason: &str,
    confidence: Confidence,
    context: serde_json::Value,
    notes: Option<&str>,
) -> Signal {
    let smas = sma_levels(panel);
    let (setup, setup_context) = build_signal_setup(
        signal_type,
        direction,
        panel.close,
        &smas,
        atr,
        zone,
        invalidation_level,
        Some(invalidation_reason.to_string()),
    );

    Signal {
        signal_id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        symbol: symbol.to_string(),
        signal_type,
        direction,
        priority,
        description,
        cta_zone: zone,
        setup,
        setup_context,
        context,
        confidence,
        confluence: None,
        sector_wind: None,
        bias_alignment: None,
        notes: notes.map(String::from),
    }
}

/// GOLDEN_TOUCH: first touch of the 120 SMA after an extended run above
/// it, inside a 5-12% correction, with the 20 SMA still above the 120.
pub fn check_golden_touch(
    symbol: &str,
    panel: &IndicatorPanel,
    zone: CtaZone,
    config: &ScannerConfig,
) -> Option<Signal> {
    let sma120 = panel.sma120?;
    let sma20 = panel.sma20?;
    let atr = panel.atr?;
    let correction = panel.correction_pct?;

    let touching_120 = panel.low <= sma120 * 1.01 && panel.close >= sma120 * 0.99;
    let was_above_long = panel.days_above_120 >= config.golden_touch_min_bars_above;
    let valid_correction = correction >= config.golden_touch_min_correction_pct
        && correction <= config.golden_touch_max_correction_pct;
    let uptrend_intact = sma20 > sma120;

    if !(touching_120 && was_above_long && valid_correction && uptrend_intact) {
        return None;
    }

    let invalidation_level = panel.sma50.map(|sma50| round2(sma50 - atr * 0.25));

    Some(new_signal(
        symbol,
        SignalType::GoldenTouch,
        Direction::Long,
        SignalType::GoldenTouch.base_priority(),
        format!(
            "First touch of 120 SMA after {} days above. {:.1}% correction.",
            panel.days_above_120, correction
        ),
        zone,
        panel,
        atr,
        invalidation_level,
        "Price close below 50 SMA invalidates pullback thesis",
        Confidence::High,
        serde_json::json!({
            "cta_zone": zone,
            "days_above_120": panel.days_above_120,
            "correction_pct": round2(correction),
            "sma20": panel.sma20.map(round2),
            "sma50": panel.sma50.map(round2),
            "sma120": round2(sma120),
            "volume_ratio": panel.vol_ratio.map(round2),
        }),
        Some("Rare setup. Best entry in CTA system. Use 2-close rule for confirmation."),
    ))
}

/// TWO_CLOSE_VOLUME: two consecutive closes above the 50 SMA after being
/// below, confirmed by volume over the 30-day average.
pub fn check_two_close_volume(
    symbol: &str,
    panel: &IndicatorPanel,
    zone: CtaZone,
    config: &ScannerConfig,
) -> Option<Signal> {
    let atr = panel.atr?;
    let vol_ratio = panel.vol_ratio?;

    let two_close_above_50 =
        panel.close_above_50 && panel.prev1_close_above_50 && !panel.prev2_close_above_50;
    let vol_confirmed = vol_ratio >= config.volume_breakout_threshold;

    if !(two_close_above_50 && vol_confirmed) {
        return None;
    }

    let invalidation_level = Some(round2(panel.close - atr * 1.5));

    Some(new_signal(
        symbol,
        SignalType::TwoCloseVolume,
        Direction::Long,
        SignalType::TwoCloseVolume.base_priority(),
        format!(
            "Two-close confirmation above 50 SMA with {:.0}% relative volume.",
            vol_ratio * 100.0
        ),
        zone,
        panel,
        atr,
        invalidation_level,
        "Price close below breakout level negates volume confirmation",
        Confidence::High,
        serde_json::json!({
            "cta_zone": zone,
            "sma50": panel.sma50.map(round2),
            "volume_ratio": round2(vol_ratio),
            "dist_to_50_pct": panel.dist_to_50_pct.map(round2),
        }),
        Some("CTA-confirmed breakout. Strong institutional participation."),
    ))
}

/// PULLBACK_ENTRY: a completing pullback to the 20 SMA inside MAX_LONG.
pub fn check_pullback_entry(
    symbol: &str,
    panel: &IndicatorPanel,
    zone: CtaZone,
    config: &ScannerConfig,
) -> Option<Signal> {
    if zone != CtaZone::MaxLong {
        return None;
    }

    let sma20 = panel.sma20?;
    let atr = panel.atr?;
    let dist_to_20 = panel.dist_to_20_pct?.abs();
    let prev_dist = panel.prev_dist_to_20_pct?.abs();

    let touched_20 = panel.low <= sma20 * 1.005;
    let within_band = dist_to_20 <= config.pullback_max_distance_pct;
    let was_further = prev_dist > dist_to_20 + 0.5;

    if !((within_band || touched_20) && was_further) {
        return None;
    }

    let invalidation_level = panel.sma120.map(|sma120| round2(sma120 - atr * 0.25));

    Some(new_signal(
        symbol,
        SignalType::PullbackEntry,
        Direction::Long,
        SignalType::PullbackEntry.base_priority(),
        format!(
            "Pullback to 20 SMA in Max Long zone. {:.1}% from 20 SMA.",
            dist_to_20
        ),
        zone,
        panel,
        atr,
        invalidation_level,
        "Price close below 120 SMA invalidates recovery thesis",
        Confidence::Medium,
        serde_json::json!({
            "cta_zone": zone,
            "sma20": round2(sma20),
            "sma50": panel.sma50.map(round2),
            "dist_to_20_pct": panel.dist_to_20_pct.map(round2),
            "touched_20": touched_20,
        }),
        Some("Trend continuation trade. Tight stop at 20 SMA."),
    ))
}

/// ZONE_UPGRADE: the zone moved strictly more bullish and landed at
/// DE_LEVERAGING or better.
pub fn check_zone_upgrade(
    symbol: &str,
    panel: &IndicatorPanel,
    zone: CtaZone,
    prev_zone: CtaZone,
) -> Option<Signal> {
    let atr = panel.atr?;

    if !(zone.rank() > prev_zone.rank() && zone.rank() >= CtaZone::DeLeveraging.rank()) {
        return None;
    }

    let invalidation_level = panel.sma50.map(round2);

    Some(new_signal(
        symbol,
        SignalType::ZoneUpgrade,
        Direction::Long,
        SignalType::ZoneUpgrade.base_priority(),
        format!("CTA zone upgraded from {} to {}.", prev_zone, zone),
        zone,
        panel,
        atr,
        invalidation_level,
        "Zone downgrade invalidates thesis",
        Confidence::Medium,
        serde_json::json!({
            "cta_zone": zone,
            "previous_zone": prev_zone,
            "sma20": panel.sma20.map(round2),
            "sma50": panel.sma50.map(round2),
            "sma120": panel.sma120.map(round2),
        }),
        Some("Zone transition signal. Wait for two-close confirmation for higher probability."),
    ))
}

/// TRAPPED_LONGS: price under the 200 SMA and 20-day VWAP with a trending
/// tape, RSI still above 40 and elevated relative volume.
pub fn check_trapped_longs(symbol: &str, panel: &IndicatorPanel, zone: CtaZone) -> Option<Signal> {
    let sma200 = panel.sma200?;
    let vwap = panel.vwap20?;
    let adx = panel.adx?;
    let rsi = panel.rsi?;
    let rvol = panel.rvol?;
    let atr = panel.atr.unwrap_or(0.0);

    let all_conditions = panel.close < sma200
        && panel.close < vwap
        && adx > 20.0
        && rsi > 40.0
        && rvol > 1.25;
    if !all_conditions {
        return None;
    }

    let upgraded = rvol > 2.0 && adx > 30.0;
    let priority = if upgraded { 100 } else { 80 };
    let invalidation_level = Some(round2(sma200 + atr * 0.25));

    Some(new_signal(
        symbol,
        SignalType::TrappedLongs,
        Direction::Short,
        priority,
        format!(
            "Trapped longs: Price below 200 SMA and VWAP, ADX {:.0}, RVOL {:.1}x",
            adx, rvol
        ),
        zone,
        panel,
        atr,
        invalidation_level,
        "Price reclaiming 200 SMA negates trapped longs thesis",
        if upgraded {
            Confidence::High
        } else {
            Confidence::Medium
        },
        serde_json::json!({
            "cta_zone": zone,
            "sma200": round2(sma200),
            "vwap_20": round2(vwap),
            "pct_from_vwap": round2((panel.close - vwap) / vwap * 100.0),
            "adx": round2(adx),
            "rsi": round2(rsi),
            "rvol": round2(rvol),
        }),
        None,
    ))
}

/// TRAPPED_SHORTS: mirror of TRAPPED_LONGS: shorts underwater above the
/// 200 SMA and VWAP with RSI under 60.
pub fn check_trapped_shorts(symbol: &str, panel: &IndicatorPanel, zone: CtaZone) -> Option<Signal> {
    let sma200 = panel.sma200?;
    let vwap = panel.vwap20?;
    let adx = panel.adx?;
    let rsi = panel.rsi?;
    let rvol = panel.rvol?;
    let atr = panel.atr.unwrap_or(0.0);

    let all_conditions = panel.close > sma200
        && panel.close > vwap
        && adx > 20.0
        && rsi < 60.0
        && rvol > 1.25;
    if !all_conditions {
        return None;
    }

    let upgraded = rvol > 2.0 && adx > 30.0;
    let priority = if upgraded { 100 } else { 80 };
    let invalidation_level = Some(round2(sma200 - atr * 0.25));

    Some(new_signal(
        symbol,
        SignalType::TrappedShorts,
        Direction::Long,
        priority,
        format!(
            "Trapped shorts: Price above 200 SMA and VWAP, ADX {:.0}, RVOL {:.1}x",
            adx, rvol
        ),
        zone,
        panel,
        atr,
        invalidation_level,
        "Price losing 200 SMA negates trapped shorts thesis",
        if upgraded {
            Confidence::High
        } else {
            Confidence::Medium
        },
        serde_json::json!({
            "cta_zone": zone,
            "sma200": round2(sma200),
            "vwap_20": round2(vwap),
            "pct_from_vwap": round2((panel.close - vwap) / vwap * 100.0),
            "adx": round2(adx),
            "rsi": round2(rsi),
            "rvol": round2(rvol),
        }),
        None,
    ))
}
