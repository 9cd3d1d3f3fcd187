use std::time::Duration;

use serde::Deserialize;

/// Circuit breaker thresholds, shared by every provider's breaker
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open a closed breaker
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Failure rate over the trailing window that opens a closed breaker
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
    /// Minimum outcomes in the window before the rate is evaluated
    #[serde(default = "default_min_samples")]
    pub min_samples: u32,
    /// Length of the trailing outcome window
    #[serde(
        default = "default_window",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub window: Duration,
    /// Time an open breaker blocks traffic before probing
    #[serde(
        default = "default_cooldown",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub cooldown: Duration,
    /// Consecutive half-open successes that close the breaker
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Half-open failure count at which the breaker reopens; values above 1
    /// absorb a transient blip during recovery instead of flapping
    #[serde(default = "default_half_open_tolerance")]
    pub half_open_tolerance: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            failure_rate: default_failure_rate(),
            min_samples: default_min_samples(),
            window: default_window(),
            cooldown: default_cooldown(),
            success_threshold: default_success_threshold(),
            half_open_tolerance: default_half_open_tolerance(),
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_failure_threshold() -> u32 {
    5
}

#[allow(clippy::missing_const_for_fn)]
fn default_failure_rate() -> f64 {
    0.5
}

#[allow(clippy::missing_const_for_fn)]
fn default_min_samples() -> u32 {
    10
}

fn default_window() -> Duration {
    Duration::from_secs(60)
}

fn default_cooldown() -> Duration {
    Duration::from_secs(60)
}

#[allow(clippy::missing_const_for_fn)]
fn default_success_threshold() -> u32 {
    2
}

#[allow(clippy::missing_const_for_fn)]
fn default_half_open_tolerance() -> u32 {
    2
}
