use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Shared breaker-state mirror configuration
///
/// Best effort only: an unreachable mirror degrades breakers to purely
/// local state and never fails a request.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorConfig {
    /// Valkey/Redis connection URL
    pub url: Url,
    /// How long mirrored state stays valid
    #[serde(
        default = "default_ttl",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub ttl: Duration,
    /// Key prefix; defaults to `relay:breaker`
    #[serde(default)]
    pub key_prefix: Option<String>,
}

fn default_ttl() -> Duration {
    Duration::from_secs(300)
}
