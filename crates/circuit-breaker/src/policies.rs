use bias_core::SchedulerBiasLevel;

/// Verification condition checked before an active trigger may decay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerifyCondition {
    /// SPY change vs prior close must be above the threshold (percent).
    SpyNotDownPct(f64),
    /// VIX must be below the threshold.
    VixBelow(f64),
}

/// Fixed policy installed when a trigger fires.
#[derive(Debug, Clone, Copy)]
pub struct TriggerPolicy {
    pub trigger: &'static str,
    /// Higher = more severe; lower severity may not overwrite higher.
    pub severity: i32,
    pub bias_cap: Option<SchedulerBiasLevel>,
    pub bias_floor: Option<SchedulerBiasLevel>,
    pub scoring_modifier: f64,
    pub description: &'static str,
    /// Minutes before the decay check starts consulting the condition.
    /// None means the trigger clears state instead of installing it.
    pub max_decay_minutes: Option<i64>,
    /// None with a decay window means the timer alone is sufficient.
    pub verify: Option<VerifyCondition>,
}

pub const TRIGGER_POLICIES: &[TriggerPolicy] = &[
    TriggerPolicy {
        trigger: "spy_recovery",
        severity: 0,
        bias_cap: None,
        bias_floor: None,
        scoring_modifier: 1.0,
        description: "SPY back above prior close: All-clear signal",
        max_decay_minutes: None,
        verify: None,
    },
    TriggerPolicy {
        trigger: "spy_up_2pct",
        severity: 1,
        bias_cap: None,
        bias_floor: Some(SchedulerBiasLevel::LeanUrsa),
        scoring_modifier: 1.1,
        description: "SPY +2% recovery: Partial all-clear, cautious optimism",
        max_decay_minutes: Some(240),
        verify: None,
    },
    TriggerPolicy {
        trigger: "spy_down_1pct",
        severity: 2,
        bias_cap: Some(SchedulerBiasLevel::MinorToro),
        bias_floor: None,
        scoring_modifier: 0.9,
        description: "SPY -1% intraday: Minor caution, cap bullish bias",
        max_decay_minutes: Some(240),
        verify: Some(VerifyCondition::SpyNotDownPct(-1.0)),
    },
    TriggerPolicy {
        trigger: "vix_spike",
        severity: 3,
        bias_cap: Some(SchedulerBiasLevel::MinorToro),
        bias_floor: None,
        scoring_modifier: 0.85,
        description: "VIX +15%: Heightened volatility, reduce bullish exposure",
        max_decay_minutes: Some(360),
        verify: Some(VerifyCondition::VixBelow(20.0)),
    },
    TriggerPolicy {
        trigger: "spy_down_2pct",
        severity: 4,
        bias_cap: Some(SchedulerBiasLevel::LeanToro),
        bias_floor: Some(SchedulerBiasLevel::LeanUrsa),
        scoring_modifier: 0.75,
        description: "SPY -2% intraday: Major caution, force bearish lean",
        max_decay_minutes: Some(1440),
        verify: Some(VerifyCondition::SpyNotDownPct(-2.0)),
    },
    TriggerPolicy {
        trigger: "vix_extreme",
        severity: 5,
        bias_cap: Some(SchedulerBiasLevel::LeanToro),
        bias_floor: Some(SchedulerBiasLevel::MinorUrsa),
        scoring_modifier: 0.7,
        description: "VIX > 30: Extreme fear, force bearish stance",
        max_decay_minutes: Some(1440),
        verify: Some(VerifyCondition::VixBelow(30.0)),
    },
];

pub fn policy_for(trigger: &str) -> Option<&'static TriggerPolicy> {
    TRIGGER_POLICIES.iter().find(|p| p.trigger == trigger)
}

pub fn severity_of(trigger: &str) -> i32 {
    policy_for(trigger).map(|p| p.severity).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(severity_of("vix_extreme") > severity_of("spy_down_2pct"));
        assert!(severity_of("spy_down_2pct") > severity_of("vix_spike"));
        assert!(severity_of("vix_spike") > severity_of("spy_down_1pct"));
        assert!(severity_of("spy_down_1pct") > severity_of("spy_up_2pct"));
        assert_eq!(severity_of("spy_recovery"), 0);
    }

    #[test]
    fn test_modifier_bounds() {
        for policy in TRIGGER_POLICIES {
            assert!(policy.scoring_modifier > 0.0 && policy.scoring_modifier <= 2.0);
        }
    }

    #[test]
    fn test_spy_down_2pct_policy() {
        let p = policy_for("spy_down_2pct").unwrap();
        assert_eq!(p.bias_cap, Some(SchedulerBiasLevel::LeanToro));
        assert_eq!(p.bias_floor, Some(SchedulerBiasLevel::LeanUrsa));
        assert_eq!(p.scoring_modifier, 0.75);
        assert_eq!(p.max_decay_minutes, Some(1440));
    }
}
