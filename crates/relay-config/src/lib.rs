//! Configuration for the Relay gateway
//!
//! Typed TOML configuration with `{{ env.VAR }}` placeholder expansion,
//! covering providers, identity resolution, failover policy, the circuit
//! breaker, and the optional shared state mirror.

#![allow(clippy::must_use_candidate)]

pub mod breaker;
mod env;
pub mod failover;
mod loader;
pub mod mirror;
pub mod provider;
pub mod resolver;

use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

pub use breaker::CircuitBreakerConfig;
pub use failover::FailoverConfig;
pub use mirror::MirrorConfig;
pub use provider::{ModelPatterns, ProviderConfig, ProviderType};
pub use resolver::ResolverConfig;

/// Top-level Relay configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Upstream provider configurations keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Identity resolver configuration
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Failover policy
    #[serde(default)]
    pub failover: FailoverConfig,
    /// Circuit breaker thresholds
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Shared breaker-state mirror (absent means purely local state)
    #[serde(default)]
    pub mirror: Option<MirrorConfig>,
    /// Dispatch timeout applied when a provider has no override
    #[serde(
        default = "default_timeout",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub default_timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}
