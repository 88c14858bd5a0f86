//! Risk/reward profiles per (signal type, zone): ATR multiples for the
//! default stop and the T2 target.

use bias_core::{CtaZone, SignalType};

/// (stop_mult, target_mult) in ATRs.
pub fn rr_profile(signal_type: SignalType, zone: CtaZone) -> (f64, f64) {
    let base = match signal_type {
        SignalType::GoldenTouch => (1.5, 3.0),
        SignalType::TwoCloseVolume => (1.5, 2.5),
        SignalType::PullbackEntry => (1.0, 2.0),
        SignalType::ZoneUpgrade => (1.5, 2.0),
        SignalType::TrappedLongs | SignalType::TrappedShorts => (1.5, 2.5),
    };

    // Strong zones earn room to run; broken structure tightens the target.
    match zone {
        CtaZone::MaxLong => (base.0, base.1 + 0.5),
        CtaZone::Waterfall | CtaZone::Capitulation => (base.0, (base.1 - 0.5).max(1.5)),
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_touch_max_long() {
        let (stop_mult, target_mult) = rr_profile(SignalType::GoldenTouch, CtaZone::MaxLong);
        assert_eq!(stop_mult, 1.5);
        assert_eq!(target_mult, 3.5);
    }

    #[test]
    fn test_target_floor_in_broken_zones() {
        let (_, target_mult) = rr_profile(SignalType::ZoneUpgrade, CtaZone::Waterfall);
        assert_eq!(target_mult, 1.5);
    }

    #[test]
    fn test_every_pair_is_positive() {
        let types = [
            SignalType::GoldenTouch,
            SignalType::TwoCloseVolume,
            SignalType::PullbackEntry,
            SignalType::ZoneUpgrade,
            SignalType::TrappedLongs,
            SignalType::TrappedShorts,
        ];
        let zones = [
            CtaZone::MaxLong,
            CtaZone::Transition,
            CtaZone::DeLeveraging,
            CtaZone::Waterfall,
            CtaZone::Capitulation,
            CtaZone::Unknown,
        ];
        for signal_type in types {
            for zone in zones {
                let (stop_mult, target_mult) = rr_profile(signal_type, zone);
                assert!(stop_mult > 0.0);
                assert!(target_mult >= 1.5);
            }
        }
    }
}
