//! Entry/stop/target derivation for scanner signals.

use bias_core::{CtaZone, Direction, EntryWindow, SetupContext, SignalSetup, SignalType};

use crate::profiles::rr_profile;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// SMA levels available when a signal fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmaLevels {
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma120: Option<f64>,
    pub sma200: Option<f64>,
}

impl SmaLevels {
    fn preferred_for(&self, zone: CtaZone) -> Option<(&'static str, f64)> {
        match zone {
            CtaZone::MaxLong => self.sma20.map(|v| ("SMA20", v)),
            CtaZone::Transition => self.sma50.map(|v| ("SMA50", v)),
            CtaZone::DeLeveraging => self.sma120.map(|v| ("SMA120", v)),
            _ => None,
        }
    }

    fn all(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("20 SMA", self.sma20),
            ("50 SMA", self.sma50),
            ("120 SMA", self.sma120),
            ("200 SMA", self.sma200),
        ]
    }
}

/// Smart stop: prefer the SMA anchor appropriate to the zone offset by
/// 0.25 ATR, requiring the resulting risk to land in [0.5 ATR, 3 ATR].
/// Otherwise scan all SMAs on the protective side for the tightest valid
/// anchor, and finally fall back to the zone profile's ATR multiple.
pub fn smart_stop(
    signal_type: SignalType,
    direction: Direction,
    price: f64,
    smas: &SmaLevels,
    atr: f64,
    zone: CtaZone,
) -> (f64, String) {
    let (stop_mult, _) = rr_profile(signal_type, zone);
    let buffer = atr * 0.25;

    let risk_ok = |risk: f64| (0.5 * atr..=3.0 * atr).contains(&risk);

    if let Some((label, preferred)) = smas.preferred_for(zone) {
        match direction {
            Direction::Long if preferred < price => {
                let candidate = preferred - buffer;
                if risk_ok(price - candidate) {
                    return (
                        round2(candidate),
                        format!("{} ({}) - buffer", label, round2(preferred)),
                    );
                }
            }
            Direction::Short if preferred > price => {
                let candidate = preferred + buffer;
                if risk_ok(candidate - price) {
                    return (
                        round2(candidate),
                        format!("{} ({}) + buffer", label, round2(preferred)),
                    );
                }
            }
            _ => {}
        }
    }

    let mut candidates: Vec<(f64, String, f64)> = Vec::new();
    for (label, sma) in smas.all() {
        let Some(sma) = sma else { continue };
        match direction {
            Direction::Long if sma < price => {
                let candidate = sma - buffer;
                let risk = price - candidate;
                if risk_ok(risk) {
                    candidates.push((
                        candidate,
                        format!("{} ({}) - buffer", label, round2(sma)),
                        risk,
                    ));
                }
            }
            Direction::Short if sma > price => {
                let candidate = sma + buffer;
                let risk = candidate - price;
                if risk_ok(risk) {
                    candidates.push((
                        candidate,
                        format!("{} ({}) + buffer", label, round2(sma)),
                        risk,
                    ));
                }
            }
            _ => {}
        }
    }

    if let Some((stop, anchor, _)) = candidates
        .into_iter()
        .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
    {
        return (round2(stop), anchor);
    }

    let atr_stop = match direction {
        Direction::Long => price - atr * stop_mult,
        Direction::Short => price + atr * stop_mult,
    };
    (round2(atr_stop), format!("{stop_mult} ATR"))
}

/// Signal-type specific actionable band around the entry.
pub fn entry_window(
    signal_type: SignalType,
    direction: Direction,
    price: f64,
    smas: &SmaLevels,
    atr: f64,
) -> EntryWindow {
    if direction == Direction::Long {
        let (low, high) = match signal_type {
            SignalType::GoldenTouch => match smas.sma20 {
                Some(sma20) => (sma20, sma20 + atr * 0.75),
                None => (price - atr * 0.25, price + atr * 0.5),
            },
            SignalType::PullbackEntry => match smas.sma50 {
                Some(sma50) => (sma50, sma50 + atr * 0.75),
                None => (price - atr * 0.25, price + atr * 0.5),
            },
            SignalType::TwoCloseVolume => (price - atr * 0.25, price + atr),
            SignalType::TrappedShorts => (price - atr * 0.5, price + atr),
            _ => (price - atr * 0.5, price + atr * 0.75),
        };
        return EntryWindow {
            low: round2(low),
            high: round2(high),
        };
    }

    let (low, high) = if signal_type == SignalType::TrappedLongs {
        (price - atr, price + atr * 0.5)
    } else {
        (price - atr * 0.75, price + atr * 0.5)
    };
    EntryWindow {
        low: round2(low),
        high: round2(high),
    }
}

/// T1: the lesser (for longs) of half the full reward and the nearest
/// intermediate SMA in the direction of travel. Collapses to T2 when it
/// would sit within 0.75 risk of the entry.
pub fn calculate_t1(
    direction: Direction,
    entry: f64,
    t2: f64,
    smas: &SmaLevels,
    risk: f64,
) -> (f64, String) {
    let full_reward = (t2 - entry).abs();
    let mut anchor = "0.5x reward".to_string();

    let ordered = [
        ("SMA20", smas.sma20),
        ("SMA50", smas.sma50),
        ("SMA120", smas.sma120),
    ];

    let t1 = match direction {
        Direction::Long => {
            let t1_half = entry + full_reward * 0.5;
            let mut t1_sma = None;
            for (label, sma) in ordered {
                if let Some(sma) = sma {
                    if entry < sma && sma < t2 {
                        t1_sma = Some(sma);
                        anchor = format!("{} ({})", label, round2(sma));
                        break;
                    }
                }
            }
            t1_sma.map_or(t1_half, |sma| t1_half.min(sma))
        }
        Direction::Short => {
            let t1_half = entry - full_reward * 0.5;
            let mut t1_sma = None;
            for (label, sma) in ordered {
                if let Some(sma) = sma {
                    if t2 < sma && sma < entry {
                        t1_sma = Some(sma);
                        anchor = format!("{} ({})", label, round2(sma));
                        break;
                    }
                }
            }
            t1_sma.map_or(t1_half, |sma| t1_half.max(sma))
        }
    };

    let t1 = round2(t1);
    if risk > 0.0 && (t1 - entry).abs() < risk * 0.75 {
        return (t2, "T1 skipped (insufficient R:R)".to_string());
    }
    (t1, anchor)
}

/// Assemble the full setup plus its anchor context.
pub fn build_signal_setup(
    signal_type: SignalType,
    direction: Direction,
    price: f64,
    smas: &SmaLevels,
    atr: f64,
    zone: CtaZone,
    invalidation_level: Option<f64>,
    invalidation_reason: Option<String>,
) -> (SignalSetup, SetupContext) {
    let entry = round2(price);
    let (stop, stop_anchor) = smart_stop(signal_type, direction, entry, smas, atr, zone);
    let (stop_mult, target_mult) = rr_profile(signal_type, zone);

    let t2 = round2(match direction {
        Direction::Long => entry + atr * target_mult,
        Direction::Short => entry - atr * target_mult,
    });

    let risk = (entry - stop).abs();
    let (t1, t1_anchor) = calculate_t1(direction, entry, t2, smas, risk);
    let rr_ratio = if risk > 0.0 {
        ((t2 - entry).abs() / risk * 10.0).round() / 10.0
    } else {
        0.0
    };

    let setup = SignalSetup {
        entry,
        entry_window: entry_window(signal_type, direction, entry, smas, atr),
        stop,
        t1,
        t2,
        rr_ratio,
        invalidation_level,
        invalidation_reason,
    };

    let setup_context = SetupContext {
        stop_anchor,
        t1_anchor,
        t2_anchor: format!("{target_mult} ATR ({zone} profile)"),
        stop_mult,
        target_mult,
    };

    (setup, setup_context)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smas() -> SmaLevels {
        SmaLevels {
            sma20: Some(99.0),
            sma50: Some(96.75),
            sma120: Some(92.0),
            sma200: Some(88.0),
        }
    }

    #[test]
    fn test_smart_stop_prefers_zone_anchor() {
        // MAX_LONG prefers SMA20; risk = 100 - (99 - 0.5) = 1.5 with
        // ATR 2.0 -> inside [1.0, 6.0]
        let (stop, anchor) = smart_stop(
            SignalType::PullbackEntry,
            Direction::Long,
            100.0,
            &smas(),
            2.0,
            CtaZone::MaxLong,
        );
        assert_eq!(stop, 98.5);
        assert!(anchor.starts_with("SMA20"));
    }

    #[test]
    fn test_smart_stop_transition_uses_sma50() {
        let (stop, anchor) = smart_stop(
            SignalType::GoldenTouch,
            Direction::Long,
            100.0,
            &smas(),
            2.0,
            CtaZone::Transition,
        );
        assert_eq!(stop, 96.25);
        assert!(anchor.starts_with("SMA50"));
    }

    #[test]
    fn test_smart_stop_rejects_anchor_outside_risk_window() {
        // SMA20 at 99.9 gives risk 0.6, below the 0.5*ATR floor of 1.0.
        // The scan falls through to SMA50 (risk 3.75, inside [1.0, 6.0]).
        let tight = SmaLevels {
            sma20: Some(99.9),
            ..smas()
        };
        let (stop, anchor) = smart_stop(
            SignalType::PullbackEntry,
            Direction::Long,
            100.0,
            &tight,
            2.0,
            CtaZone::MaxLong,
        );
        assert_eq!(stop, 96.25);
        assert!(anchor.starts_with("50 SMA"));
    }

    #[test]
    fn test_smart_stop_atr_fallback() {
        // No SMA below price inside the window
        let none = SmaLevels::default();
        let (stop, anchor) = smart_stop(
            SignalType::TwoCloseVolume,
            Direction::Long,
            100.0,
            &none,
            2.0,
            CtaZone::Transition,
        );
        assert_eq!(stop, 97.0);
        assert_eq!(anchor, "1.5 ATR");
    }

    #[test]
    fn test_smart_stop_short_side() {
        let above = SmaLevels {
            sma20: Some(103.0),
            sma50: Some(105.0),
            sma120: Some(110.0),
            sma200: Some(104.0),
        };
        let (stop, _) = smart_stop(
            SignalType::TrappedLongs,
            Direction::Short,
            100.0,
            &above,
            2.0,
            CtaZone::Waterfall,
        );
        // Tightest valid anchor above price: SMA20 at 103 + 0.5 buffer
        assert_eq!(stop, 103.5);
    }

    #[test]
    fn test_entry_window_golden_touch() {
        let window = entry_window(
            SignalType::GoldenTouch,
            Direction::Long,
            100.0,
            &smas(),
            2.0,
        );
        assert_eq!(window.low, 99.0);
        assert_eq!(window.high, 100.5);
    }

    #[test]
    fn test_t1_collapses_when_too_close() {
        // Entry 100, t2 101, risk 4: half reward 0.5 < 3.0 -> T1 = T2
        let (t1, anchor) = calculate_t1(Direction::Long, 100.0, 101.0, &SmaLevels::default(), 4.0);
        assert_eq!(t1, 101.0);
        assert!(anchor.contains("T1 skipped"));
    }

    #[test]
    fn test_t1_uses_intermediate_sma() {
        let levels = SmaLevels {
            sma20: Some(102.0),
            ..Default::default()
        };
        // Entry 100, t2 106: half reward -> 103, SMA20 at 102 is nearer
        let (t1, anchor) = calculate_t1(Direction::Long, 100.0, 106.0, &levels, 2.0);
        assert_eq!(t1, 102.0);
        assert!(anchor.starts_with("SMA20"));
    }

    #[test]
    fn test_build_setup_rr_ratio() {
        let (setup, context) = build_signal_setup(
            SignalType::GoldenTouch,
            Direction::Long,
            100.0,
            &smas(),
            2.0,
            CtaZone::Transition,
            Some(96.25),
            Some("Price close below 50 SMA invalidates pullback thesis".to_string()),
        );
        assert_eq!(setup.entry, 100.0);
        assert_eq!(setup.stop, 96.25);
        assert_eq!(setup.t2, 106.0);
        assert!(setup.rr_ratio > 1.0);
        assert_eq!(context.target_mult, 3.0);
    }
}
