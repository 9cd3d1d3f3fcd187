use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for a single upstream provider
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Wire protocol spoken by the provider
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override (OpenAI-compatible third parties set this)
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Per-provider dispatch timeout; falls back to `default_timeout`
    #[serde(default, deserialize_with = "duration_str::deserialize_option_duration")]
    pub timeout: Option<Duration>,
    /// Whether the provider supports streaming responses
    #[serde(default = "default_streaming")]
    pub streaming: bool,
    /// Model eligibility patterns
    #[serde(default)]
    pub models: ModelPatterns,
}

/// Supported provider wire protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// OpenAI-compatible chat completions API
    Openai,
    /// Anthropic Messages API
    Anthropic,
}

/// Static model eligibility for a provider
///
/// Distinct from health: a provider excluded here never serves the model,
/// regardless of its circuit state.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelPatterns {
    /// Serve only models matching these patterns (regex); empty means all
    #[serde(default)]
    pub include: Vec<String>,
    /// Never serve models matching these patterns (regex)
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_streaming() -> bool {
    true
}
