//! Pure composite evaluation: staleness partition, weight renormalization,
//! velocity amplification, override handling and circuit-breaker
//! projection. No IO; the engine wrapper feeds it loaded state.

use std::collections::BTreeMap;

use bias_core::{
    clamp_score, BiasLevel, BiasOverride, CircuitBreakerState, Confidence, CompositeResult,
    FactorReading, FACTOR_CONFIG,
};
use chrono::{DateTime, Duration, Utc};

/// Factors that must drop >= 0.30 within 24 h before velocity kicks in.
pub const VELOCITY_SHIFT_COUNT: usize = 3;
pub const VELOCITY_MULTIPLIER: f64 = 1.3;

pub struct EvaluateInput {
    /// Latest reading per factor id, where one was loaded.
    pub readings: BTreeMap<String, FactorReading>,
    pub now: DateTime<Utc>,
    /// Count of factors whose score dropped >= 0.30 over the last 24 h.
    pub bearish_shifts_24h: usize,
    pub override_state: Option<BiasOverride>,
    pub breaker: CircuitBreakerState,
}

pub struct EvaluateOutput {
    pub result: CompositeResult,
    /// The override was dropped because the raw composite crossed into the
    /// opposite half; the caller must clear the persisted override.
    pub override_cleared: bool,
}

pub fn evaluate(input: EvaluateInput) -> EvaluateOutput {
    let now = input.now;

    let mut factors: BTreeMap<String, Option<FactorReading>> = BTreeMap::new();
    let mut active: Vec<(&'static str, f64, f64)> = Vec::new(); // (id, weight, score)
    let mut active_factors = Vec::new();
    let mut stale_factors = Vec::new();
    let mut unverifiable_factors = Vec::new();

    for (factor_id, cfg) in FACTOR_CONFIG {
        let reading = input.readings.get(*factor_id);
        factors.insert(factor_id.to_string(), reading.cloned());

        match reading {
            None => stale_factors.push(factor_id.to_string()),
            Some(reading) => {
                if reading.is_unverifiable() {
                    unverifiable_factors.push(factor_id.to_string());
                }
                let max_age = Duration::hours(cfg.staleness_hours as i64);
                if now - reading.timestamp <= max_age {
                    active.push((*factor_id, cfg.weight, reading.score));
                    active_factors.push(factor_id.to_string());
                } else {
                    stale_factors.push(factor_id.to_string());
                }
            }
        }
    }

    let active_weight_sum: f64 = active.iter().map(|(_, w, _)| w).sum();

    let (velocity_multiplier, mut adjusted_score) = if active_weight_sum == 0.0 {
        (1.0, 0.0)
    } else {
        let raw: f64 = active
            .iter()
            .map(|(_, weight, score)| score * (weight / active_weight_sum))
            .sum();
        let raw = clamp_score(raw);
        let velocity = if input.bearish_shifts_24h >= VELOCITY_SHIFT_COUNT {
            VELOCITY_MULTIPLIER
        } else {
            1.0
        };
        (velocity, clamp_score(raw * velocity))
    };

    let mut bias_level = BiasLevel::from_score(adjusted_score);
    let mut bias_numeric = bias_level.numeric();

    // Operator override: honored unless the raw composite has crossed into
    // the opposite half (strict TORO_* vs URSA_* test).
    let mut override_cleared = false;
    let mut override_level = None;
    let mut override_expires = None;
    if let Some(ov) = &input.override_state {
        let ov_numeric = ov.level.numeric();
        if (ov_numeric > 3 && bias_numeric <= 2) || (ov_numeric < 3 && bias_numeric >= 4) {
            override_cleared = true;
        } else {
            bias_level = ov.level;
            bias_numeric = ov_numeric;
            override_level = Some(ov.level);
            override_expires = ov.expires;
        }
    }

    // Circuit breaker projection: scoring modifier first (re-band), then
    // cap, then floor.
    let circuit_breaker = input.breaker.projection();
    if let Some(projection) = &circuit_breaker {
        if projection.scoring_modifier != 1.0 {
            adjusted_score = clamp_score(adjusted_score * projection.scoring_modifier);
            bias_level = BiasLevel::from_score(adjusted_score);
            bias_numeric = bias_level.numeric();
        }

        if let Some(cap) = projection.bias_cap {
            let cap_numeric = cap.to_composite().numeric();
            if bias_numeric > cap_numeric {
                bias_numeric = cap_numeric;
                bias_level = BiasLevel::from_numeric(cap_numeric).unwrap_or(BiasLevel::Neutral);
            }
        }

        if let Some(floor) = projection.bias_floor {
            let floor_numeric = floor.to_composite().numeric();
            if bias_numeric < floor_numeric {
                bias_numeric = floor_numeric;
                bias_level = BiasLevel::from_numeric(floor_numeric).unwrap_or(BiasLevel::Neutral);
            }
        }
    }

    let confidence = Confidence::from_active_count(active_factors.len());
    unverifiable_factors.sort();

    EvaluateOutput {
        result: CompositeResult {
            composite_score: adjusted_score,
            bias_level,
            bias_numeric,
            factors,
            active_factors,
            stale_factors,
            velocity_multiplier,
            override_level,
            override_expires,
            timestamp: now,
            confidence,
            unverifiable_factors,
            circuit_breaker,
        },
        override_cleared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bias_core::{SchedulerBiasLevel, TimestampSource};

    fn reading(factor_id: &str, score: f64, age_hours: i64) -> FactorReading {
        FactorReading::new(
            factor_id,
            score,
            String::new(),
            Utc::now() - Duration::hours(age_hours),
            "test",
        )
    }

    fn input_with(readings: Vec<FactorReading>) -> EvaluateInput {
        EvaluateInput {
            readings: readings
                .into_iter()
                .map(|r| (r.factor_id.clone(), r))
                .collect(),
            now: Utc::now(),
            bearish_shifts_24h: 0,
            override_state: None,
            breaker: CircuitBreakerState::default(),
        }
    }

    #[test]
    fn test_empty_input_is_neutral_low() {
        let out = evaluate(input_with(vec![]));
        assert_eq!(out.result.composite_score, 0.0);
        assert_eq!(out.result.bias_level, BiasLevel::Neutral);
        assert_eq!(out.result.bias_numeric, 3);
        assert_eq!(out.result.confidence, Confidence::Low);
        assert_eq!(out.result.velocity_multiplier, 1.0);
        assert_eq!(out.result.stale_factors.len(), FACTOR_CONFIG.len());
        assert!(out.result.factors.values().all(|r| r.is_none()));
    }

    #[test]
    fn test_partition_is_exhaustive_and_disjoint() {
        let readings = vec![
            reading("vix_regime", 0.2, 1),
            // Older than its 4h staleness window
            reading("vix_term", 0.5, 6),
            reading("credit_spreads", -0.4, 10),
        ];
        let out = evaluate(input_with(readings));

        let active: std::collections::HashSet<_> =
            out.result.active_factors.iter().cloned().collect();
        let stale: std::collections::HashSet<_> =
            out.result.stale_factors.iter().cloned().collect();
        assert!(active.contains("vix_regime"));
        assert!(active.contains("credit_spreads"));
        assert!(stale.contains("vix_term"));
        assert!(active.is_disjoint(&stale));
        assert_eq!(active.len() + stale.len(), FACTOR_CONFIG.len());
    }

    #[test]
    fn test_renormalized_weighted_sum() {
        // Seven active factors all scoring 0.41: renormalized weights sum
        // to 1.0 so the composite is exactly 0.41 -> TORO_MINOR, HIGH.
        let ids = [
            "vix_term",
            "vix_regime",
            "credit_spreads",
            "market_breadth",
            "sector_rotation",
            "yield_curve",
            "dxy_trend",
        ];
        let readings = ids.iter().map(|id| reading(id, 0.41, 1)).collect();
        let out = evaluate(input_with(readings));

        assert!((out.result.composite_score - 0.41).abs() < 1e-9);
        assert_eq!(out.result.bias_level, BiasLevel::ToroMinor);
        assert_eq!(out.result.confidence, Confidence::High);
        assert_eq!(out.result.active_factors.len(), 7);
    }

    #[test]
    fn test_velocity_kick() {
        let ids = [
            "vix_term",
            "vix_regime",
            "credit_spreads",
            "market_breadth",
        ];
        let readings = ids.iter().map(|id| reading(id, 0.30, 1)).collect();
        let mut input = input_with(readings);
        input.bearish_shifts_24h = 4;
        let out = evaluate(input);

        assert_eq!(out.result.velocity_multiplier, 1.3);
        assert!((out.result.composite_score - 0.39).abs() < 1e-9);
        assert_eq!(out.result.bias_level, BiasLevel::ToroMinor);
    }

    #[test]
    fn test_velocity_needs_three_shifts() {
        let mut input = input_with(vec![reading("vix_regime", 0.3, 1)]);
        input.bearish_shifts_24h = 2;
        let out = evaluate(input);
        assert_eq!(out.result.velocity_multiplier, 1.0);
    }

    #[test]
    fn test_override_applies_when_not_opposed() {
        let mut input = input_with(vec![reading("vix_regime", 0.0, 1)]);
        input.override_state = Some(BiasOverride {
            level: BiasLevel::ToroMajor,
            reason: None,
            created_at: Utc::now(),
            expires: None,
        });
        let out = evaluate(input);
        assert!(!out.override_cleared);
        assert_eq!(out.result.bias_level, BiasLevel::ToroMajor);
        assert_eq!(out.result.override_level, Some(BiasLevel::ToroMajor));
    }

    #[test]
    fn test_override_cleared_when_composite_crosses_opposite() {
        // Bullish override while the raw composite sits in URSA territory
        let mut input = input_with(vec![reading("vix_regime", -0.5, 1)]);
        input.override_state = Some(BiasOverride {
            level: BiasLevel::ToroMajor,
            reason: None,
            created_at: Utc::now(),
            expires: None,
        });
        let out = evaluate(input);
        assert!(out.override_cleared);
        assert_eq!(out.result.bias_level, BiasLevel::UrsaMinor);
        assert_eq!(out.result.override_level, None);
    }

    #[test]
    fn test_neutral_composite_does_not_clear_override() {
        let mut input = input_with(vec![reading("vix_regime", 0.0, 1)]);
        input.override_state = Some(BiasOverride {
            level: BiasLevel::UrsaMinor,
            reason: None,
            created_at: Utc::now(),
            expires: None,
        });
        let out = evaluate(input);
        assert!(!out.override_cleared);
        assert_eq!(out.result.bias_level, BiasLevel::UrsaMinor);
    }

    #[test]
    fn test_breaker_modifier_and_cap() {
        // Raw 0.7 (TORO_MAJOR); vix_extreme projects 0.7 modifier, cap
        // LEAN_TORO, floor MINOR_URSA
        let mut input = input_with(vec![reading("vix_regime", 0.7, 1)]);
        input.breaker = CircuitBreakerState {
            active: true,
            trigger: Some("vix_extreme".to_string()),
            triggered_at: Some(Utc::now()),
            bias_cap: Some(SchedulerBiasLevel::LeanToro),
            bias_floor: Some(SchedulerBiasLevel::MinorUrsa),
            scoring_modifier: 0.7,
            ..Default::default()
        };
        let out = evaluate(input);

        // 0.7 * 0.7 = 0.49 -> TORO_MINOR; cap at LEAN_TORO (=4) not binding
        assert!((out.result.composite_score - 0.49).abs() < 1e-9);
        assert_eq!(out.result.bias_level, BiasLevel::ToroMinor);
        let projection = out.result.circuit_breaker.unwrap();
        assert_eq!(projection.trigger, "vix_extreme");
        assert_eq!(projection.scoring_modifier, 0.7);
    }

    #[test]
    fn test_breaker_cap_binds() {
        let mut input = input_with(vec![reading("vix_regime", 0.95, 1)]);
        input.breaker = CircuitBreakerState {
            active: true,
            trigger: Some("spy_down_1pct".to_string()),
            triggered_at: Some(Utc::now()),
            bias_cap: Some(SchedulerBiasLevel::MinorToro),
            scoring_modifier: 1.0,
            ..Default::default()
        };
        let out = evaluate(input);
        // 0.95 would be TORO_MAJOR, capped at MINOR_TORO -> TORO_MINOR
        assert_eq!(out.result.bias_numeric, 4);
        assert_eq!(out.result.bias_level, BiasLevel::ToroMinor);
    }

    #[test]
    fn test_breaker_floor_binds() {
        let mut input = input_with(vec![reading("vix_regime", -0.9, 1)]);
        input.breaker = CircuitBreakerState {
            active: true,
            trigger: Some("vix_extreme".to_string()),
            triggered_at: Some(Utc::now()),
            bias_floor: Some(SchedulerBiasLevel::MinorUrsa),
            scoring_modifier: 1.0,
            ..Default::default()
        };
        let out = evaluate(input);
        // -0.9 would be URSA_MAJOR (1), floored at MINOR_URSA -> 2
        assert_eq!(out.result.bias_numeric, 2);
        assert_eq!(out.result.bias_level, BiasLevel::UrsaMinor);
    }

    #[test]
    fn test_pending_breaker_uses_faded_modifier() {
        let mut input = input_with(vec![reading("vix_regime", 0.4, 1)]);
        input.breaker = CircuitBreakerState {
            active: true,
            trigger: Some("vix_spike".to_string()),
            triggered_at: Some(Utc::now() - Duration::hours(7)),
            scoring_modifier: 0.8,
            pending_reset: true,
            pending_since: Some(Utc::now()),
            decay_fade: 0.5,
            ..Default::default()
        };
        let out = evaluate(input);
        // Effective modifier = 1 + (0.8 - 1) * 0.5 = 0.9 -> 0.36
        assert!((out.result.composite_score - 0.36).abs() < 1e-9);
    }

    #[test]
    fn test_unverifiable_tracking() {
        let mut fallback = reading("put_call_ratio", 0.1, 1);
        fallback = fallback.with_timestamp_source(TimestampSource::Fallback);
        let verified =
            reading("vix_regime", 0.1, 1).with_timestamp_source(TimestampSource::UpdatedAt);

        let out = evaluate(input_with(vec![fallback, verified]));
        assert_eq!(out.result.unverifiable_factors, vec!["put_call_ratio"]);
    }

    #[test]
    fn test_result_serializes_canonically() {
        let out = evaluate(input_with(vec![reading("vix_regime", 0.25, 1)]));
        let json = serde_json::to_string(&out.result).unwrap();
        let back: CompositeResult = serde_json::from_str(&json).unwrap();
        let json2 = serde_json::to_string(&back).unwrap();
        assert_eq!(json, json2);
    }
}
