use std::collections::HashMap;

use serde::Deserialize;

/// Failover policy configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailoverConfig {
    /// Whether failed attempts advance to the next provider at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Append configured fallbacks even when the caller named a provider
    /// explicitly
    #[serde(default)]
    pub explicit_provider_fallback: bool,
    /// Fallback providers tried after the primary, in order, for models
    /// without a per-model entry
    #[serde(default)]
    pub default_fallbacks: Vec<String>,
    /// Per-model fallback overrides keyed by canonical model id
    #[serde(default)]
    pub fallbacks: HashMap<String, Vec<String>>,
    /// Upper bound on providers attempted per request, primary included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            explicit_provider_fallback: false,
            default_fallbacks: Vec::new(),
            fallbacks: HashMap::new(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl FailoverConfig {
    /// Fallback providers configured for a canonical model
    pub fn fallbacks_for(&self, model: &str) -> &[String] {
        self.fallbacks
            .get(model)
            .map_or(&self.default_fallbacks, Vec::as_slice)
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_enabled() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_attempts() -> usize {
    3
}
