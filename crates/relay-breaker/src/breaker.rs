//! The per-provider breaker state machine
//!
//! Transition logic takes the current time as an explicit epoch-seconds
//! argument so cooldown behavior is testable without sleeping; the
//! registry passes wall-clock now.

use std::collections::VecDeque;

use relay_config::CircuitBreakerConfig;
use serde::{Deserialize, Serialize};

/// Circuit state for a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, requests flow through
    Closed,
    /// Provider is failing, requests are rejected before dispatch
    Open,
    /// Probing recovery with live traffic
    HalfOpen,
}

impl CircuitState {
    /// Human-readable name used in logs and snapshots
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// One recorded request outcome
#[derive(Debug, Clone, Copy)]
struct Outcome {
    at: u64,
    success: bool,
}

/// A state transition, reported to observability by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
    pub reason: &'static str,
}

/// Observable breaker state for status endpoints
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    /// Current circuit state
    pub state: CircuitState,
    /// Consecutive failure count
    pub failure_count: u32,
    /// Consecutive success count
    pub success_count: u32,
    /// Seconds until an open breaker admits a probe; zero otherwise
    pub seconds_until_retry: u64,
}

/// Serialized breaker state as mirrored to the shared store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedBreaker {
    /// Circuit state
    pub state: CircuitState,
    /// Consecutive failure count
    pub consecutive_failures: u32,
    /// Consecutive success count
    pub consecutive_successes: u32,
    /// Failures observed since the current recovery probe began
    pub half_open_failures: u32,
    /// Epoch seconds the circuit opened; meaningful only when open
    pub opened_at: u64,
}

/// Per-provider breaker state
///
/// The sliding outcome window is not mirrored; a restarted instance
/// resumes with counters and state only.
#[derive(Debug)]
pub(crate) struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    half_open_failures: u32,
    opened_at: u64,
    window: VecDeque<Outcome>,
}

impl Breaker {
    pub(crate) const fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            half_open_failures: 0,
            opened_at: 0,
            window: VecDeque::new(),
        }
    }

    pub(crate) fn from_persisted(persisted: &PersistedBreaker) -> Self {
        Self {
            state: persisted.state,
            consecutive_failures: persisted.consecutive_failures,
            consecutive_successes: persisted.consecutive_successes,
            half_open_failures: persisted.half_open_failures,
            opened_at: persisted.opened_at,
            window: VecDeque::new(),
        }
    }

    pub(crate) fn to_persisted(&self) -> PersistedBreaker {
        PersistedBreaker {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            half_open_failures: self.half_open_failures,
            opened_at: self.opened_at,
        }
    }

    pub(crate) const fn state(&self) -> CircuitState {
        self.state
    }

    /// Record an outcome and evaluate the transition table
    pub(crate) fn record_at(
        &mut self,
        now: u64,
        success: bool,
        config: &CircuitBreakerConfig,
    ) -> Option<Transition> {
        self.window.push_back(Outcome { at: now, success });
        self.prune_window(now, config);

        if success {
            self.consecutive_successes += 1;
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
            self.consecutive_successes = 0;
        }

        match self.state {
            CircuitState::Closed if !success => {
                if self.consecutive_failures >= config.failure_threshold {
                    return Some(self.open(now, "consecutive failure threshold reached"));
                }
                if self.window_failure_rate(config).is_some_and(|rate| rate >= config.failure_rate) {
                    return Some(self.open(now, "failure rate over trailing window exceeded"));
                }
                None
            }
            CircuitState::HalfOpen => {
                if success {
                    if self.consecutive_successes >= config.success_threshold {
                        return Some(self.close("recovered after successful probes"));
                    }
                    None
                } else {
                    self.half_open_failures += 1;
                    if self.half_open_failures >= config.half_open_tolerance {
                        return Some(self.open(now, "failed during recovery probing"));
                    }
                    None
                }
            }
            // Open stays open until the cooldown admits a probe; Closed
            // successes need no transition
            _ => None,
        }
    }

    /// Whether an attempt may be dispatched right now
    ///
    /// The only side effect is the open-to-half-open transition once the
    /// cooldown has elapsed; a still-cooling breaker answers false without
    /// mutating anything.
    pub(crate) fn should_attempt_at(
        &mut self,
        now: u64,
        config: &CircuitBreakerConfig,
    ) -> (bool, Option<Transition>) {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => (true, None),
            CircuitState::Open => {
                if now.saturating_sub(self.opened_at) >= config.cooldown.as_secs() {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_failures = 0;
                    self.consecutive_successes = 0;
                    let transition = Transition {
                        from: CircuitState::Open,
                        to: CircuitState::HalfOpen,
                        reason: "cooldown elapsed, probing recovery",
                    };
                    (true, Some(transition))
                } else {
                    (false, None)
                }
            }
        }
    }

    pub(crate) fn snapshot_at(&self, now: u64, config: &CircuitBreakerConfig) -> BreakerSnapshot {
        let seconds_until_retry = match self.state {
            CircuitState::Open => (self.opened_at + config.cooldown.as_secs()).saturating_sub(now),
            _ => 0,
        };

        BreakerSnapshot {
            state: self.state,
            failure_count: self.consecutive_failures,
            success_count: self.consecutive_successes,
            seconds_until_retry,
        }
    }

    fn open(&mut self, now: u64, reason: &'static str) -> Transition {
        let from = self.state;
        self.state = CircuitState::Open;
        self.opened_at = now;
        self.half_open_failures = 0;
        Transition {
            from,
            to: CircuitState::Open,
            reason,
        }
    }

    fn close(&mut self, reason: &'static str) -> Transition {
        let from = self.state;
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.half_open_failures = 0;
        self.opened_at = 0;
        self.window.clear();
        Transition {
            from,
            to: CircuitState::Closed,
            reason,
        }
    }

    /// Drop window entries older than the configured window length
    fn prune_window(&mut self, now: u64, config: &CircuitBreakerConfig) {
        let horizon = now.saturating_sub(config.window.as_secs());
        while self.window.front().is_some_and(|o| o.at < horizon) {
            self.window.pop_front();
        }
    }

    /// Failure rate over the window, once the minimum sample size is met
    fn window_failure_rate(&self, config: &CircuitBreakerConfig) -> Option<f64> {
        let samples = self.window.len();
        if samples < config.min_samples as usize {
            return None;
        }
        let failures = self.window.iter().filter(|o| !o.success).count();
        #[allow(clippy::cast_precision_loss)]
        Some(failures as f64 / samples as f64)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 5,
            failure_rate: 0.5,
            min_samples: 10,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(60),
            success_threshold: 2,
            half_open_tolerance: 2,
        }
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let config = config();
        let mut breaker = Breaker::new();

        for i in 0..4 {
            assert!(breaker.record_at(i, false, &config).is_none());
        }
        let transition = breaker.record_at(4, false, &config).expect("opens on fifth failure");
        assert_eq!(transition.to, CircuitState::Open);
        assert_eq!(breaker.state(), CircuitState::Open);

        // A sixth failure is absorbed without re-transitioning
        assert!(breaker.record_at(5, false, &config).is_none());
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn success_interrupts_the_consecutive_count() {
        let config = config();
        let mut breaker = Breaker::new();

        for i in 0..4 {
            breaker.record_at(i, false, &config);
        }
        breaker.record_at(4, true, &config);
        assert!(breaker.record_at(5, false, &config).is_none());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn opens_on_failure_rate_with_min_samples() {
        let config = config();
        let mut breaker = Breaker::new();

        // Alternate so the consecutive threshold never trips: 5 failures
        // over 10 samples reaches the 0.5 rate exactly at the tenth
        let mut transition = None;
        for i in 0..10u64 {
            transition = breaker.record_at(i, i % 2 == 0, &config);
        }
        let transition = transition.expect("rate threshold opens the breaker");
        assert_eq!(transition.to, CircuitState::Open);
    }

    #[test]
    fn rate_is_not_evaluated_below_min_samples() {
        let config = config();
        let mut breaker = Breaker::new();

        // 100% failure rate but only 4 samples, below both thresholds
        for i in 0..4 {
            assert!(breaker.record_at(i * 20, false, &config).is_none());
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn stale_window_entries_are_dropped() {
        let config = config();
        let mut breaker = Breaker::new();

        // 9 alternating outcomes: 5 failures, below both thresholds
        for i in 0..9u64 {
            breaker.record_at(i, i % 2 == 1, &config);
        }
        // 100 seconds later every early failure fell out of the window,
        // so the rate is evaluated over too few samples to matter
        assert!(breaker.record_at(100, false, &config).is_none());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn cooldown_gates_the_recovery_probe() {
        let config = config();
        let mut breaker = Breaker::new();
        for i in 0..5 {
            breaker.record_at(i, false, &config);
        }
        let opened_at = 4;

        let (allowed, transition) = breaker.should_attempt_at(opened_at + 59, &config);
        assert!(!allowed);
        assert!(transition.is_none());
        assert_eq!(breaker.state(), CircuitState::Open);

        let (allowed, transition) = breaker.should_attempt_at(opened_at + 61, &config);
        assert!(allowed);
        assert_eq!(transition.unwrap().to, CircuitState::HalfOpen);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let config = config();
        let mut breaker = Breaker::new();
        for i in 0..5 {
            breaker.record_at(i, false, &config);
        }
        breaker.should_attempt_at(100, &config);

        assert!(breaker.record_at(101, true, &config).is_none());
        let transition = breaker.record_at(102, true, &config).expect("closes");
        assert_eq!(transition.to, CircuitState::Closed);

        let snapshot = breaker.snapshot_at(102, &config);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.success_count, 0);
    }

    #[test]
    fn half_open_tolerates_a_blip_then_reopens() {
        let config = config();
        let mut breaker = Breaker::new();
        for i in 0..5 {
            breaker.record_at(i, false, &config);
        }
        breaker.should_attempt_at(100, &config);

        // First failure during probing is tolerated, the second reopens
        assert!(breaker.record_at(101, false, &config).is_none());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        let transition = breaker.record_at(102, false, &config).expect("reopens");
        assert_eq!(transition.to, CircuitState::Open);

        // Cooldown restarted from the reopen
        let (allowed, _) = breaker.should_attempt_at(102 + 59, &config);
        assert!(!allowed);
        let (allowed, _) = breaker.should_attempt_at(102 + 61, &config);
        assert!(allowed);
    }

    #[test]
    fn snapshot_reports_time_until_retry() {
        let config = config();
        let mut breaker = Breaker::new();
        for _ in 0..5 {
            breaker.record_at(10, false, &config);
        }

        let snapshot = breaker.snapshot_at(30, &config);
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.seconds_until_retry, 40);
    }

    #[test]
    fn persisted_round_trip_preserves_state() {
        let config = config();
        let mut breaker = Breaker::new();
        for i in 0..5 {
            breaker.record_at(i, false, &config);
        }

        let persisted = breaker.to_persisted();
        let restored = Breaker::from_persisted(&persisted);
        assert_eq!(restored.state(), CircuitState::Open);
        assert_eq!(restored.to_persisted(), persisted);
    }
}
