//! Hourly outcome tracking: walk open signals and match daily bars
//! against their stop/T1/T2 levels.

use bias_core::{Bar, Direction, SignalOutcome};

/// Signals still open after this many bars are closed as expired.
pub const MAX_BARS_HELD: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeMatch {
    pub outcome: SignalOutcome,
    pub exit_price: f64,
    pub bars_held: usize,
    pub pnl_r: f64,
}

/// Walk bars (oldest first, all after signal emission) until the stop or
/// a target is touched. The stop is checked before targets on the same
/// bar, the conservative read of an OHLC range. T1 only terminates the
/// trade when the expiry window runs out without T2.
pub fn match_outcome(
    direction: Direction,
    entry: f64,
    stop: f64,
    t1: f64,
    t2: f64,
    bars: &[Bar],
) -> Option<OutcomeMatch> {
    let risk = (entry - stop).abs();
    if risk == 0.0 || bars.is_empty() {
        return None;
    }

    let pnl_r = |exit: f64| match direction {
        Direction::Long => (exit - entry) / risk,
        Direction::Short => (entry - exit) / risk,
    };

    let mut t1_hit = false;

    for (i, bar) in bars.iter().enumerate() {
        let bars_held = i + 1;
        match direction {
            Direction::Long => {
                if bar.low <= stop {
                    return Some(OutcomeMatch {
                        outcome: SignalOutcome::HitStop,
                        exit_price: stop,
                        bars_held,
                        pnl_r: pnl_r(stop),
                    });
                }
                if bar.high >= t2 {
                    return Some(OutcomeMatch {
                        outcome: SignalOutcome::HitT2,
                        exit_price: t2,
                        bars_held,
                        pnl_r: pnl_r(t2),
                    });
                }
                if bar.high >= t1 {
                    t1_hit = true;
                }
            }
            Direction::Short => {
                if bar.high >= stop {
                    return Some(OutcomeMatch {
                        outcome: SignalOutcome::HitStop,
                        exit_price: stop,
                        bars_held,
                        pnl_r: pnl_r(stop),
                    });
                }
                if bar.low <= t2 {
                    return Some(OutcomeMatch {
                        outcome: SignalOutcome::HitT2,
                        exit_price: t2,
                        bars_held,
                        pnl_r: pnl_r(t2),
                    });
                }
                if bar.low <= t1 {
                    t1_hit = true;
                }
            }
        }

        if bars_held >= MAX_BARS_HELD {
            let exit_price = if t1_hit { t1 } else { bar.close };
            return Some(OutcomeMatch {
                outcome: if t1_hit {
                    SignalOutcome::HitT1
                } else {
                    SignalOutcome::Expired
                },
                exit_price,
                bars_held,
                pnl_r: pnl_r(exit_price),
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn bar(i: usize, low: f64, high: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc::now() + Duration::days(i as i64),
            open: close,
            high,
            low,
            close,
            volume: 1_000_000.0,
        }
    }

    #[test]
    fn test_long_hits_stop() {
        let bars = vec![bar(0, 98.0, 101.0, 100.0), bar(1, 94.0, 99.0, 95.0)];
        let result = match_outcome(Direction::Long, 100.0, 96.0, 103.0, 106.0, &bars).unwrap();
        assert_eq!(result.outcome, SignalOutcome::HitStop);
        assert_eq!(result.exit_price, 96.0);
        assert_eq!(result.bars_held, 2);
        assert_eq!(result.pnl_r, -1.0);
    }

    #[test]
    fn test_long_hits_t2() {
        let bars = vec![bar(0, 99.0, 102.0, 101.0), bar(1, 101.0, 107.0, 106.0)];
        let result = match_outcome(Direction::Long, 100.0, 96.0, 103.0, 106.0, &bars).unwrap();
        assert_eq!(result.outcome, SignalOutcome::HitT2);
        assert_eq!(result.exit_price, 106.0);
        assert!((result.pnl_r - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_stop_beats_target_on_same_bar() {
        // Wide bar sweeps both levels; the stop wins
        let bars = vec![bar(0, 95.0, 107.0, 100.0)];
        let result = match_outcome(Direction::Long, 100.0, 96.0, 103.0, 106.0, &bars).unwrap();
        assert_eq!(result.outcome, SignalOutcome::HitStop);
    }

    #[test]
    fn test_short_hits_t2() {
        let bars = vec![bar(0, 95.0, 101.0, 96.0), bar(1, 93.0, 97.0, 94.0)];
        let result = match_outcome(Direction::Short, 100.0, 104.0, 97.0, 94.0, &bars).unwrap();
        assert_eq!(result.outcome, SignalOutcome::HitT2);
        assert!((result.pnl_r - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_expiry_with_t1_touch() {
        let mut bars: Vec<Bar> = (0..MAX_BARS_HELD)
            .map(|i| bar(i, 99.0, 102.0, 101.0))
            .collect();
        // One bar touched T1 early but never T2
        bars[3] = bar(3, 100.0, 103.5, 102.0);
        let result = match_outcome(Direction::Long, 100.0, 96.0, 103.0, 110.0, &bars).unwrap();
        assert_eq!(result.outcome, SignalOutcome::HitT1);
        assert_eq!(result.exit_price, 103.0);
    }

    #[test]
    fn test_expiry_without_touch() {
        let bars: Vec<Bar> = (0..MAX_BARS_HELD)
            .map(|i| bar(i, 99.0, 101.0, 100.5))
            .collect();
        let result = match_outcome(Direction::Long, 100.0, 96.0, 103.0, 110.0, &bars).unwrap();
        assert_eq!(result.outcome, SignalOutcome::Expired);
        assert_eq!(result.exit_price, 100.5);
    }

    #[test]
    fn test_open_when_nothing_matches_yet() {
        let bars = vec![bar(0, 99.0, 101.0, 100.0)];
        assert!(match_outcome(Direction::Long, 100.0, 96.0, 103.0, 110.0, &bars).is_none());
    }
}
