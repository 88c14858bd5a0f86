//! Circuit breaker state machine for external market risk events.
//!
//! Triggers arrive from authenticated webhooks and install a fixed policy
//! (bias cap/floor + scoring modifier). A no-downgrade guard keeps lower
//! severity triggers from overwriting higher ones. Decay is condition
//! verified: the timer must elapse AND the underlying condition must have
//! cleared before the breaker moves to pending_reset, where the scoring
//! modifier fades linearly toward 1.0 over 60 minutes until the operator
//! accepts or rejects the reset.

use std::sync::Mutex;

use async_trait::async_trait;
use bias_core::{BiasError, CircuitBreakerState, MarketDataProvider};
use chrono::{DateTime, Duration, Utc};
use kv_store::{keys, KvStore};

mod policies;

pub use policies::{policy_for, severity_of, TriggerPolicy, VerifyCondition, TRIGGER_POLICIES};

const BREAKER_STATE_TTL_SECS: u64 = 86_400;

/// Minutes over which the pending-reset fade runs.
pub const PENDING_FADE_MINUTES: f64 = 60.0;

/// Linear fade factor while pending: 1.0 at pending_since, 0.0 after 60 min.
pub fn pending_fade(pending_since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed_min = (now - pending_since).num_seconds() as f64 / 60.0;
    let fade = (1.0 - elapsed_min / PENDING_FADE_MINUTES).max(0.0);
    (fade * 1000.0).round() / 1000.0
}

/// Outcome of an Apply call. A refused downgrade is a no-op with status,
/// not an error.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Applied(CircuitBreakerState),
    NoDowngrade(CircuitBreakerState),
    Cleared(CircuitBreakerState),
}

impl ApplyOutcome {
    pub fn state(&self) -> &CircuitBreakerState {
        match self {
            ApplyOutcome::Applied(s) | ApplyOutcome::NoDowngrade(s) | ApplyOutcome::Cleared(s) => s,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DecayStatus {
    TimerElapsedConditionActive { trigger: String },
    PendingReset { state: CircuitBreakerState },
    FadeUpdated { fade: f64 },
}

#[derive(Debug, Clone)]
pub enum ResetOutcome {
    Accepted { trigger: String },
    Rejected { trigger: String },
    NoPendingReset,
}

/// Live checks used to verify that a trigger condition has cleared.
#[async_trait]
pub trait ConditionVerifier: Send + Sync {
    /// SPY percent change vs prior close, if determinable.
    async fn spy_change_pct(&self) -> Option<f64>;

    /// Latest VIX level, if determinable.
    async fn vix_level(&self) -> Option<f64>;
}

/// Verifier backed by any daily-bar provider.
pub struct MarketVerifier {
    provider: std::sync::Arc<dyn MarketDataProvider>,
}

impl MarketVerifier {
    pub fn new(provider: std::sync::Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ConditionVerifier for MarketVerifier {
    async fn spy_change_pct(&self) -> Option<f64> {
        let bars = self.provider.daily_bars("SPY", 5).await.ok()?;
        if bars.len() < 2 {
            return None;
        }
        let current = bars[bars.len() - 1].close;
        let prev_close = bars[bars.len() - 2].close;
        if prev_close <= 0.0 {
            return None;
        }
        Some((current - prev_close) / prev_close * 100.0)
    }

    async fn vix_level(&self) -> Option<f64> {
        self.provider.latest_price("^VIX").await.ok().flatten()
    }
}

async fn condition_cleared(
    condition: Option<VerifyCondition>,
    verifier: &dyn ConditionVerifier,
) -> bool {
    match condition {
        None => true,
        Some(VerifyCondition::SpyNotDownPct(threshold)) => match verifier.spy_change_pct().await {
            Some(change_pct) => change_pct > threshold,
            None => false,
        },
        Some(VerifyCondition::VixBelow(threshold)) => match verifier.vix_level().await {
            Some(vix) => vix < threshold,
            None => false,
        },
    }
}

pub struct CircuitBreaker {
    state: Mutex<CircuitBreakerState>,
    kv: Option<KvStore>,
}

impl CircuitBreaker {
    pub fn new(kv: Option<KvStore>) -> Self {
        Self {
            state: Mutex::new(CircuitBreakerState::default()),
            kv,
        }
    }

    pub fn state(&self) -> CircuitBreakerState {
        self.state.lock().expect("breaker lock poisoned").clone()
    }

    /// Install the persisted state after process restart.
    pub async fn restore(&self) -> bool {
        let Some(kv) = &self.kv else { return false };
        match kv.get_json::<CircuitBreakerState>(keys::CIRCUIT_BREAKER).await {
            Ok(Some(restored)) => {
                tracing::info!(
                    "Circuit breaker state restored (trigger={:?} active={} pending={})",
                    restored.trigger,
                    restored.active,
                    restored.pending_reset
                );
                *self.state.lock().expect("breaker lock poisoned") = restored;
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Failed to restore circuit breaker state: {}", e);
                false
            }
        }
    }

    /// Install the given state directly (restore path and tests).
    pub fn install_state(&self, state: CircuitBreakerState) {
        *self.state.lock().expect("breaker lock poisoned") = state;
    }

    async fn persist(&self, state: &CircuitBreakerState) {
        if let Some(kv) = &self.kv {
            if let Err(e) = kv
                .set_json_ex(keys::CIRCUIT_BREAKER, state, BREAKER_STATE_TTL_SECS)
                .await
            {
                tracing::warn!("Failed to persist circuit breaker state: {}", e);
            }
        }
    }

    /// Apply a trigger, honoring the no-downgrade guard.
    pub async fn apply(&self, trigger: &str) -> Result<ApplyOutcome, BiasError> {
        let trigger = trigger.to_lowercase();
        let policy =
            policy_for(&trigger).ok_or_else(|| BiasError::UnknownTrigger(trigger.clone()))?;

        let outcome = {
            let mut state = self.state.lock().expect("breaker lock poisoned");

            if state.active {
                let current_severity = state
                    .trigger
                    .as_deref()
                    .map(severity_of)
                    .unwrap_or(0);
                if policy.severity < current_severity {
                    tracing::info!(
                        "Breaker no-downgrade: {} (severity {}) cannot overwrite {:?} (severity {})",
                        trigger,
                        policy.severity,
                        state.trigger,
                        current_severity
                    );
                    return Ok(ApplyOutcome::NoDowngrade(state.clone()));
                }
            }

            if policy.max_decay_minutes.is_none() {
                // spy_recovery: clear entirely
                *state = CircuitBreakerState {
                    description: Some(policy.description.to_string()),
                    ..Default::default()
                };
                tracing::info!("Circuit breaker cleared by {}", trigger);
                ApplyOutcome::Cleared(state.clone())
            } else {
                *state = CircuitBreakerState {
                    active: true,
                    trigger: Some(trigger.clone()),
                    triggered_at: Some(Utc::now()),
                    bias_cap: policy.bias_cap,
                    bias_floor: policy.bias_floor,
                    scoring_modifier: policy.scoring_modifier,
                    description: Some(policy.description.to_string()),
                    pending_reset: false,
                    pending_since: None,
                    decay_fade: 1.0,
                };
                tracing::warn!("Circuit breaker triggered: {}", trigger);
                ApplyOutcome::Applied(state.clone())
            }
        };

        self.persist(outcome.state()).await;
        Ok(outcome)
    }

    /// Decay tick, invoked from every composite cycle. Transitions to
    /// pending_reset when the timer has elapsed AND the condition verifies
    /// cleared; while pending, refreshes the linear fade.
    pub async fn check_decay(&self, verifier: &dyn ConditionVerifier) -> Option<DecayStatus> {
        // Snapshot under the lock, verify outside it.
        let (trigger, triggered_at, pending_reset, pending_since) = {
            let state = self.state.lock().expect("breaker lock poisoned");
            if !state.active {
                return None;
            }
            (
                state.trigger.clone()?,
                state.triggered_at,
                state.pending_reset,
                state.pending_since,
            )
        };

        if pending_reset {
            let pending_since = pending_since?;
            let fade = pending_fade(pending_since, Utc::now());
            let mut state = self.state.lock().expect("breaker lock poisoned");
            if state.pending_reset {
                state.decay_fade = fade;
            }
            return Some(DecayStatus::FadeUpdated { fade });
        }

        let policy = policy_for(&trigger)?;
        let max_minutes = policy.max_decay_minutes?;
        let triggered_at = triggered_at?;

        if Utc::now() - triggered_at < Duration::minutes(max_minutes) {
            return None;
        }

        if !condition_cleared(policy.verify, verifier).await {
            tracing::info!(
                "Breaker decay: timer elapsed for {} but condition not cleared, staying active",
                trigger
            );
            return Some(DecayStatus::TimerElapsedConditionActive { trigger });
        }

        let snapshot = {
            let mut state = self.state.lock().expect("breaker lock poisoned");
            // Re-check: Apply may have raced in while we were verifying.
            if !state.active || state.pending_reset || state.trigger.as_deref() != Some(trigger.as_str())
            {
                return None;
            }
            state.pending_reset = true;
            state.pending_since = Some(Utc::now());
            state.decay_fade = 1.0;
            state.clone()
        };

        tracing::info!("Breaker decay: {} transitioning to pending_reset", trigger);
        self.persist(&snapshot).await;
        Some(DecayStatus::PendingReset { state: snapshot })
    }

    /// Operator accepts the pending reset: breaker clears entirely.
    pub async fn accept_reset(&self) -> ResetOutcome {
        let (outcome, snapshot) = {
            let mut state = self.state.lock().expect("breaker lock poisoned");
            if !state.pending_reset {
                return ResetOutcome::NoPendingReset;
            }
            let trigger = state.trigger.clone().unwrap_or_else(|| "unknown".to_string());
            *state = CircuitBreakerState::default();
            (ResetOutcome::Accepted { trigger }, state.clone())
        };

        if let ResetOutcome::Accepted { trigger } = &outcome {
            tracing::info!("Breaker reset accepted for trigger: {}", trigger);
        }
        self.persist(&snapshot).await;
        outcome
    }

    /// Operator rejects the pending reset: breaker stays active and the
    /// decay clock restarts.
    pub async fn reject_reset(&self) -> ResetOutcome {
        let (outcome, snapshot) = {
            let mut state = self.state.lock().expect("breaker lock poisoned");
            if !state.pending_reset {
                return ResetOutcome::NoPendingReset;
            }
            let trigger = state.trigger.clone().unwrap_or_else(|| "unknown".to_string());
            state.pending_reset = false;
            state.pending_since = None;
            state.decay_fade = 1.0;
            state.triggered_at = Some(Utc::now());
            (ResetOutcome::Rejected { trigger }, state.clone())
        };

        if let ResetOutcome::Rejected { trigger } = &outcome {
            tracing::info!("Breaker reset rejected for trigger: {} (timer reset)", trigger);
        }
        self.persist(&snapshot).await;
        outcome
    }

    /// Manual full reset (operator endpoint, not the accept/reject path).
    pub async fn reset(&self) -> CircuitBreakerState {
        let snapshot = {
            let mut state = self.state.lock().expect("breaker lock poisoned");
            *state = CircuitBreakerState::default();
            state.clone()
        };
        tracing::info!("Circuit breaker reset - normal operations resumed");
        self.persist(&snapshot).await;
        snapshot
    }
}
