use super::*;
use bias_core::{Confidence, SignalType};
use super::indicators::IndicatorPanel;

fn base_panel() -> IndicatorPanel {
    IndicatorPanel {
        close: 100.0,
        low: 99.0,
        volume: 1_000_000.0,
        sma20: Some(98.0),
        sma50: Some(95.0),
        sma120: Some(90.0),
        sma200: Some(85.0),
        atr: Some(2.0),
        rsi: Some(55.0),
        adx: Some(18.0),
        vwap20: Some(99.0),
        vol_ratio: Some(1.0),
        rvol: Some(1.0),
        rolling_high_60: Some(108.0),
        correction_pct: Some(7.0),
        days_above_120: 60,
        dist_to_20_pct: Some(2.0),
        dist_to_50_pct: Some(5.3),
        dist_to_120_pct: Some(11.1),
        prev_dist_to_20_pct: Some(3.0),
        close_above_50: true,
        prev1_close_above_50: true,
        prev2_close_above_50: true,
    }
}

#[test]
fn test_golden_touch_scenario() {
    // 60 days above the 120 SMA, today's low within 1% of it, 7% off the
    // rolling-60 high, 20 SMA still above the 120.
    let panel = IndicatorPanel {
        close: 100.0,
        low: 99.9,
        sma20: Some(101.0),
        sma50: Some(97.0),
        sma120: Some(100.5),
        sma200: Some(94.0),
        dist_to_20_pct: Some(-0.99),
        ..base_panel()
    };
    let zone = zones::cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);
    let config = ScannerConfig::default();

    let signals =
        Scanner::evaluate_panel("NVDA", &panel, zone, zone, &config);
    let golden: Vec<_> = signals
        .iter()
        .filter(|s| s.signal_type == SignalType::GoldenTouch)
        .collect();
    assert_eq!(golden.len(), 1);

    let signal = golden[0];
    assert_eq!(signal.direction, Direction::Long);
    assert_eq!(signal.priority, 100);
    assert_eq!(signal.confidence, Confidence::High);
    // Tightest valid SMA below price is the 50 at 97: stop 97 - 0.25*ATR
    assert_eq!(signal.setup.stop, 96.5);
    assert!(signal.setup_context.stop_anchor.starts_with("50 SMA"));
    // T2 = entry + target_mult * ATR per the (GOLDEN_TOUCH, zone) profile
    let expected_t2 = 100.0 + signal.setup_context.target_mult * 2.0;
    assert!((signal.setup.t2 - expected_t2).abs() < 1e-9);
}

#[test]
fn test_golden_touch_requires_long_streak() {
    let panel = IndicatorPanel {
        close: 100.0,
        low: 99.9,
        sma20: Some(101.0),
        sma120: Some(100.5),
        days_above_120: 30,
        ..base_panel()
    };
    let zone = zones::cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);
    let signals = Scanner::evaluate_panel("NVDA", &panel, zone, zone, &ScannerConfig::default());
    assert!(signals
        .iter()
        .all(|s| s.signal_type != SignalType::GoldenTouch));
}

#[test]
fn test_golden_touch_rejects_deep_correction() {
    let panel = IndicatorPanel {
        close: 100.0,
        low: 99.9,
        sma20: Some(101.0),
        sma120: Some(100.5),
        correction_pct: Some(15.0),
        ..base_panel()
    };
    let zone = zones::cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);
    let signals = Scanner::evaluate_panel("NVDA", &panel, zone, zone, &ScannerConfig::default());
    assert!(signals
        .iter()
        .all(|s| s.signal_type != SignalType::GoldenTouch));
}

#[test]
fn test_two_close_volume_fires_on_reclaim() {
    let panel = IndicatorPanel {
        close_above_50: true,
        prev1_close_above_50: true,
        prev2_close_above_50: false,
        vol_ratio: Some(1.2),
        ..base_panel()
    };
    let zone = zones::cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);
    let signals = Scanner::evaluate_panel("AMD", &panel, zone, zone, &ScannerConfig::default());
    let found = signals
        .iter()
        .find(|s| s.signal_type == SignalType::TwoCloseVolume)
        .expect("two-close signal");
    assert_eq!(found.direction, Direction::Long);
    assert_eq!(found.confidence, Confidence::High);
}

#[test]
fn test_two_close_volume_needs_volume() {
    let panel = IndicatorPanel {
        close_above_50: true,
        prev1_close_above_50: true,
        prev2_close_above_50: false,
        vol_ratio: Some(1.05),
        ..base_panel()
    };
    let zone = zones::cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);
    let signals = Scanner::evaluate_panel("AMD", &panel, zone, zone, &ScannerConfig::default());
    assert!(signals
        .iter()
        .all(|s| s.signal_type != SignalType::TwoCloseVolume));
}

#[test]
fn test_pullback_entry_in_max_long() {
    let panel = IndicatorPanel {
        close: 100.0,
        low: 98.3,
        sma20: Some(98.0),
        dist_to_20_pct: Some(1.0),
        prev_dist_to_20_pct: Some(2.0),
        ..base_panel()
    };
    let zone = zones::cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);
    assert_eq!(zone, CtaZone::MaxLong);

    let signals = Scanner::evaluate_panel("MSFT", &panel, zone, zone, &ScannerConfig::default());
    let found = signals
        .iter()
        .find(|s| s.signal_type == SignalType::PullbackEntry)
        .expect("pullback signal");
    assert_eq!(found.cta_zone, CtaZone::MaxLong);
}

#[test]
fn test_zone_upgrade_requires_de_leveraging_or_better() {
    let panel = base_panel();
    let zone = zones::cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);
    assert_eq!(zone, CtaZone::MaxLong);

    // Waterfall -> MaxLong upgrade fires
    let signals = Scanner::evaluate_panel(
        "CAT",
        &panel,
        zone,
        CtaZone::Waterfall,
        &ScannerConfig::default(),
    );
    assert!(signals
        .iter()
        .any(|s| s.signal_type == SignalType::ZoneUpgrade));

    // Same zone: nothing
    let signals = Scanner::evaluate_panel("CAT", &panel, zone, zone, &ScannerConfig::default());
    assert!(signals
        .iter()
        .all(|s| s.signal_type != SignalType::ZoneUpgrade));
}

#[test]
fn test_trapped_longs_conditions() {
    let panel = IndicatorPanel {
        close: 100.0,
        sma200: Some(105.0),
        vwap20: Some(102.0),
        adx: Some(25.0),
        rsi: Some(50.0),
        rvol: Some(1.5),
        // Keep the long rules quiet
        sma20: Some(101.0),
        dist_to_20_pct: Some(-0.99),
        prev_dist_to_20_pct: Some(0.5),
        close_above_50: true,
        prev1_close_above_50: true,
        prev2_close_above_50: true,
        days_above_120: 10,
        ..base_panel()
    };
    let zone = zones::cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);
    let signals = Scanner::evaluate_panel("WFC", &panel, zone, zone, &ScannerConfig::default());
    let found = signals
        .iter()
        .find(|s| s.signal_type == SignalType::TrappedLongs)
        .expect("trapped longs signal");
    assert_eq!(found.direction, Direction::Short);
    assert_eq!(found.priority, 80);
    assert_eq!(found.confidence, Confidence::Medium);
}

#[test]
fn test_trapped_longs_priority_upgrade() {
    let panel = IndicatorPanel {
        close: 100.0,
        sma200: Some(105.0),
        vwap20: Some(102.0),
        adx: Some(32.0),
        rsi: Some(50.0),
        rvol: Some(2.5),
        sma20: Some(101.0),
        dist_to_20_pct: Some(-0.99),
        prev_dist_to_20_pct: Some(0.5),
        days_above_120: 10,
        ..base_panel()
    };
    let zone = zones::cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);
    let signals = Scanner::evaluate_panel("WFC", &panel, zone, zone, &ScannerConfig::default());
    let found = signals
        .iter()
        .find(|s| s.signal_type == SignalType::TrappedLongs)
        .unwrap();
    assert_eq!(found.priority, 100);
    assert_eq!(found.confidence, Confidence::High);
}

#[test]
fn test_conflicting_long_and_short_marked() {
    // MAX_LONG pullback completing while price sits under the 200 SMA and
    // VWAP with trending volume: PULLBACK_ENTRY (LONG) and TRAPPED_LONGS
    // (SHORT) on the same bar.
    let panel = IndicatorPanel {
        close: 100.0,
        low: 98.4,
        sma20: Some(99.0),
        sma50: Some(95.0),
        sma120: Some(90.0),
        sma200: Some(105.0),
        vwap20: Some(101.0),
        adx: Some(25.0),
        rsi: Some(50.0),
        rvol: Some(1.5),
        dist_to_20_pct: Some(1.01),
        prev_dist_to_20_pct: Some(2.0),
        days_above_120: 10,
        correction_pct: Some(2.0),
        ..base_panel()
    };
    let zone = zones::cta_zone(panel.close, panel.sma20, panel.sma50, panel.sma120);
    assert_eq!(zone, CtaZone::MaxLong);

    let signals = Scanner::evaluate_panel("TSLA", &panel, zone, zone, &ScannerConfig::default());
    assert!(signals.len() >= 2);
    for signal in &signals {
        let confluence = signal.confluence.as_ref().expect("confluence set");
        assert_eq!(confluence.warning.as_deref(), Some("CONFLICTING_SIGNALS"));
        assert_eq!(signal.confidence, Confidence::Low);
    }
}
