use std::path::PathBuf;

use serde::Deserialize;

/// Identity resolver configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Provider used when inference finds no match
    #[serde(default)]
    pub default_provider: Option<String>,
    /// Path to a model catalog JSON asset replacing the built-in one
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}
