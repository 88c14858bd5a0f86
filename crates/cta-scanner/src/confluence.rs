//! Confluence scoring across all signals on one ticker.

use bias_core::{Confidence, Confluence, Direction, Signal, SignalType};

const BASE_BOOST: i32 = 25;
const HIGH_CONFIDENCE_BOOST: i32 = 40;

/// Boost aligned signals; flag and downgrade conflicting ones.
pub fn score_confluence(mut signals: Vec<Signal>) -> Vec<Signal> {
    if signals.len() <= 1 {
        return signals;
    }

    let long_count = signals
        .iter()
        .filter(|s| s.direction == Direction::Long)
        .count();
    let short_count = signals.len() - long_count;

    if long_count > 0 && short_count > 0 {
        let count = signals.len();
        let note = format!(
            "{long_count} LONG + {short_count} SHORT signals on same ticker - thesis is muddled"
        );
        for signal in &mut signals {
            signal.confluence = Some(Confluence {
                count,
                signal_types: vec![],
                boost: 0,
                combo: None,
                warning: Some("CONFLICTING_SIGNALS".to_string()),
                note: Some(note.clone()),
            });
            signal.confidence = Confidence::Low;
        }
        return signals;
    }

    let signal_types: Vec<SignalType> = signals.iter().map(|s| s.signal_type).collect();

    let (combo_boost, combo_label) = if signal_types.contains(&SignalType::GoldenTouch)
        && signal_types.contains(&SignalType::TrappedShorts)
    {
        (
            40,
            Some("Squeeze into trend (Golden Touch + Trapped Shorts)".to_string()),
        )
    } else if signal_types.contains(&SignalType::GoldenTouch)
        && signal_types.contains(&SignalType::TwoCloseVolume)
    {
        (25, Some("Trend + Volume confirmation".to_string()))
    } else {
        (0, None)
    };

    let base_boost = if signals.len() >= 2 { BASE_BOOST } else { 0 };
    let total_boost = base_boost + combo_boost;
    let count = signals.len();

    for signal in &mut signals {
        signal.priority += total_boost;
        if total_boost >= HIGH_CONFIDENCE_BOOST {
            signal.confidence = Confidence::High;
        }
        signal.confluence = Some(Confluence {
            count,
            signal_types: signal_types.clone(),
            boost: total_boost,
            combo: combo_label.clone(),
            warning: None,
            note: None,
        });
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use bias_core::{CtaZone, EntryWindow, SetupContext, SignalSetup};
    use chrono::Utc;

    fn signal(signal_type: SignalType, direction: Direction) -> Signal {
        Signal {
            signal_id: format!("{signal_type}-{direction}"),
            timestamp: Utc::now(),
            symbol: "NVDA".to_string(),
            signal_type,
            direction,
            priority: signal_type.base_priority(),
            description: String::new(),
            cta_zone: CtaZone::MaxLong,
            setup: SignalSetup {
                entry: 100.0,
                entry_window: EntryWindow {
                    low: 99.0,
                    high: 101.0,
                },
                stop: 97.0,
                t1: 103.0,
                t2: 106.0,
                rr_ratio: 2.0,
                invalidation_level: None,
                invalidation_reason: None,
            },
            setup_context: SetupContext {
                stop_anchor: "1.5 ATR".to_string(),
                t1_anchor: "0.5x reward".to_string(),
                t2_anchor: "3 ATR".to_string(),
                stop_mult: 1.5,
                target_mult: 3.0,
            },
            context: serde_json::Value::Null,
            confidence: Confidence::Medium,
            confluence: None,
            sector_wind: None,
            bias_alignment: None,
            notes: None,
        }
    }

    #[test]
    fn test_single_signal_untouched() {
        let signals = score_confluence(vec![signal(SignalType::GoldenTouch, Direction::Long)]);
        assert!(signals[0].confluence.is_none());
        assert_eq!(signals[0].priority, 100);
    }

    #[test]
    fn test_conflicting_signals_marked_low() {
        let signals = score_confluence(vec![
            signal(SignalType::TrappedLongs, Direction::Short),
            signal(SignalType::PullbackEntry, Direction::Long),
        ]);
        for s in &signals {
            let confluence = s.confluence.as_ref().unwrap();
            assert_eq!(confluence.warning.as_deref(), Some("CONFLICTING_SIGNALS"));
            assert_eq!(s.confidence, Confidence::Low);
            // No boost applied on conflict
            assert_eq!(s.priority, s.signal_type.base_priority());
        }
    }

    #[test]
    fn test_aligned_pair_gets_base_boost() {
        let signals = score_confluence(vec![
            signal(SignalType::PullbackEntry, Direction::Long),
            signal(SignalType::ZoneUpgrade, Direction::Long),
        ]);
        for s in &signals {
            assert_eq!(s.confluence.as_ref().unwrap().boost, 25);
            // 25 < 40: confidence not upgraded
            assert_eq!(s.confidence, Confidence::Medium);
        }
        assert_eq!(signals[0].priority, 50 + 25);
    }

    #[test]
    fn test_golden_touch_trapped_shorts_combo() {
        let signals = score_confluence(vec![
            signal(SignalType::GoldenTouch, Direction::Long),
            signal(SignalType::TrappedShorts, Direction::Long),
        ]);
        for s in &signals {
            let confluence = s.confluence.as_ref().unwrap();
            assert_eq!(confluence.boost, 65);
            assert!(confluence.combo.as_deref().unwrap().contains("Squeeze"));
            assert_eq!(s.confidence, Confidence::High);
        }
    }

    #[test]
    fn test_golden_touch_volume_combo() {
        let signals = score_confluence(vec![
            signal(SignalType::GoldenTouch, Direction::Long),
            signal(SignalType::TwoCloseVolume, Direction::Long),
        ]);
        for s in &signals {
            let confluence = s.confluence.as_ref().unwrap();
            assert_eq!(confluence.boost, 50);
            assert_eq!(s.confidence, Confidence::High);
        }
    }
}
