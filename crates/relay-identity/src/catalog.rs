//! The model catalog asset
//!
//! Loading is the only fallible operation in this crate; everything
//! downstream of a loaded catalog degrades to pass-through defaults.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Embedded default catalog, tuned for this deployment's provider mix
const DEFAULT_CATALOG: &str = include_str!("../assets/catalog.json");

/// Fallback model id used when a catalog does not name one
pub(crate) const FALLBACK_MODEL: &str = "openrouter/auto";

/// Errors loading a model catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog file could not be read
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// Catalog JSON is malformed
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Static per-provider model mapping tables
///
/// The provider scan order for inference is part of the data, not the
/// algorithm — deployments reorder `provider_priority` freely.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelCatalog {
    /// Order in which provider tables are scanned during inference
    #[serde(default)]
    pub provider_priority: Vec<String>,
    /// Substituted for a blank model id so transformation stays total
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    /// User-facing alias -> canonical id
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    /// Canonical id -> owning provider, beats every other inference rule
    #[serde(default)]
    pub overrides: HashMap<String, String>,
    /// Meta-model id -> per-provider substitute for providers that cannot
    /// serve the meta-model itself
    #[serde(default)]
    pub meta_defaults: HashMap<String, HashMap<String, String>>,
    /// Bare-prefix heuristics applied when nothing else matches
    #[serde(default)]
    pub prefix_rules: Vec<PrefixRule>,
    /// Per-provider mapping tables: canonical id -> native id
    #[serde(default)]
    pub providers: HashMap<String, HashMap<String, String>>,
}

fn default_fallback_model() -> String {
    FALLBACK_MODEL.to_owned()
}

/// A single heuristic prefix rule
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixRule {
    /// Id prefix, e.g. `claude-`
    pub prefix: String,
    /// Provider the prefix implies
    pub provider: String,
}

impl ModelCatalog {
    /// The catalog shipped with the crate
    ///
    /// # Panics
    ///
    /// Panics if the embedded asset is malformed, which is caught by tests.
    pub fn embedded() -> Self {
        serde_json::from_str(DEFAULT_CATALOG).expect("embedded catalog is valid JSON")
    }

    /// Load a replacement catalog from disk
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Whether a provider name appears anywhere in the catalog
    pub fn knows_provider(&self, provider: &str) -> bool {
        self.providers.contains_key(provider) || self.provider_priority.iter().any(|p| p == provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_parses() {
        let catalog = ModelCatalog::embedded();
        assert!(!catalog.provider_priority.is_empty());
        assert!(!catalog.providers.is_empty());
        assert!(!catalog.fallback_model.trim().is_empty());
    }

    #[test]
    fn priority_entries_have_tables() {
        let catalog = ModelCatalog::embedded();
        for provider in &catalog.provider_priority {
            assert!(
                catalog.providers.contains_key(provider),
                "priority entry '{provider}' has no mapping table"
            );
        }
    }

    #[test]
    fn override_targets_are_known_providers() {
        let catalog = ModelCatalog::embedded();
        for provider in catalog.overrides.values() {
            assert!(catalog.knows_provider(provider));
        }
    }
}
