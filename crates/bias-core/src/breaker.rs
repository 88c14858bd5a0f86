use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BreakerProjection, SchedulerBiasLevel};

/// Circuit breaker state. Exactly one trigger is active at a time; the
/// no-downgrade guard in the breaker crate is the only writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub active: bool,
    pub trigger: Option<String>,
    pub triggered_at: Option<DateTime<Utc>>,
    /// Maximum bullish level allowed while active.
    pub bias_cap: Option<SchedulerBiasLevel>,
    /// Minimum bearish level enforced while active.
    pub bias_floor: Option<SchedulerBiasLevel>,
    /// Multiplier applied to the composite score before band mapping.
    pub scoring_modifier: f64,
    pub description: Option<String>,
    /// Timer elapsed and condition verified cleared; awaiting operator.
    pub pending_reset: bool,
    pub pending_since: Option<DateTime<Utc>>,
    /// Linear fade factor during pending_reset (1.0 -> 0.0 over 60 min).
    pub decay_fade: f64,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            active: false,
            trigger: None,
            triggered_at: None,
            bias_cap: None,
            bias_floor: None,
            scoring_modifier: 1.0,
            description: None,
            pending_reset: false,
            pending_since: None,
            decay_fade: 1.0,
        }
    }
}

impl CircuitBreakerState {
    /// Scoring modifier with the pending-reset fade applied: while pending,
    /// the modifier interpolates linearly toward 1.0 as the fade drops to 0.
    pub fn effective_scoring_modifier(&self) -> f64 {
        if self.pending_reset {
            1.0 + (self.scoring_modifier - 1.0) * self.decay_fade
        } else {
            self.scoring_modifier
        }
    }

    pub fn projection(&self) -> Option<BreakerProjection> {
        if !self.active {
            return None;
        }
        Some(BreakerProjection {
            active: true,
            trigger: self.trigger.clone().unwrap_or_else(|| "unknown".to_string()),
            scoring_modifier: self.effective_scoring_modifier(),
            bias_cap: self.bias_cap,
            bias_floor: self.bias_floor,
            triggered_at: self.triggered_at,
            decay_fade: self.decay_fade,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_inactive() {
        let state = CircuitBreakerState::default();
        assert!(!state.active);
        assert_eq!(state.scoring_modifier, 1.0);
        assert!(state.projection().is_none());
    }

    #[test]
    fn test_effective_modifier_fades_toward_one() {
        let mut state = CircuitBreakerState {
            active: true,
            trigger: Some("vix_spike".to_string()),
            scoring_modifier: 0.85,
            ..Default::default()
        };
        assert_eq!(state.effective_scoring_modifier(), 0.85);

        state.pending_reset = true;
        state.decay_fade = 0.5;
        let eff = state.effective_scoring_modifier();
        assert!((eff - 0.925).abs() < 1e-9);

        state.decay_fade = 0.0;
        assert!((state.effective_scoring_modifier() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let state = CircuitBreakerState {
            active: true,
            trigger: Some("spy_down_2pct".to_string()),
            triggered_at: Some(Utc::now()),
            bias_cap: Some(SchedulerBiasLevel::LeanToro),
            bias_floor: Some(SchedulerBiasLevel::LeanUrsa),
            scoring_modifier: 0.75,
            description: Some("SPY -2% intraday".to_string()),
            pending_reset: true,
            pending_since: Some(Utc::now()),
            decay_fade: 0.42,
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: CircuitBreakerState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pending_reset, state.pending_reset);
        assert_eq!(back.pending_since, state.pending_since);
        assert_eq!(back.decay_fade, state.decay_fade);
        assert_eq!(back.bias_cap, Some(SchedulerBiasLevel::LeanToro));
    }
}
