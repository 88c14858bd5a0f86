//! CTA zone classification from the 20/50/120 SMA stack.

use bias_core::CtaZone;

pub fn cta_zone(
    price: f64,
    sma20: Option<f64>,
    sma50: Option<f64>,
    sma120: Option<f64>,
) -> CtaZone {
    let (Some(sma20), Some(sma50), Some(sma120)) = (sma20, sma50, sma120) else {
        return CtaZone::Unknown;
    };

    // Structural breakdown first: fast average under the slow one.
    if sma20 < sma120 {
        return CtaZone::Capitulation;
    }

    if price > sma20 && price > sma50 && price > sma120 {
        CtaZone::MaxLong
    } else if price < sma20 && price >= sma50 {
        CtaZone::DeLeveraging
    } else if price < sma50 {
        CtaZone::Waterfall
    } else {
        CtaZone::Transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitulation_checked_first() {
        // Even with price above everything, sma20 < sma120 is structural
        assert_eq!(
            cta_zone(110.0, Some(90.0), Some(95.0), Some(100.0)),
            CtaZone::Capitulation
        );
    }

    #[test]
    fn test_max_long() {
        assert_eq!(cta_zone(110.0, Some(105.0), Some(100.0), Some(95.0)), CtaZone::MaxLong);
    }

    #[test]
    fn test_de_leveraging() {
        // Below 20 but at/above 50
        assert_eq!(cta_zone(101.0, Some(105.0), Some(100.0), Some(95.0)), CtaZone::DeLeveraging);
    }

    #[test]
    fn test_waterfall() {
        assert_eq!(cta_zone(98.0, Some(105.0), Some(100.0), Some(95.0)), CtaZone::Waterfall);
    }

    #[test]
    fn test_transition() {
        // Sitting exactly on the 20 SMA: neither max-long nor a breakdown
        assert_eq!(cta_zone(105.0, Some(105.0), Some(100.0), Some(95.0)), CtaZone::Transition);
    }

    #[test]
    fn test_unknown_without_smas() {
        assert_eq!(cta_zone(100.0, None, Some(1.0), Some(1.0)), CtaZone::Unknown);
    }
}
