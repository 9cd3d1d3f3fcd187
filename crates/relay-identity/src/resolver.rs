//! Alias canonicalization, provider inference, and native-id transformation

use std::collections::HashMap;

use crate::catalog::ModelCatalog;

/// Identity resolver over a loaded model catalog
///
/// All lookups are case-insensitive; lowercased index maps are built once
/// at construction.
pub struct Resolver {
    catalog: ModelCatalog,
    /// Alias table with lowercased keys
    aliases: HashMap<String, String>,
    /// Override table with lowercased keys
    overrides: HashMap<String, String>,
}

impl Resolver {
    /// Build a resolver over a catalog
    pub fn new(catalog: ModelCatalog) -> Self {
        let aliases = catalog
            .aliases
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        let overrides = catalog
            .overrides
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();

        Self {
            catalog,
            aliases,
            overrides,
        }
    }

    /// Resolver over the embedded default catalog
    pub fn embedded() -> Self {
        Self::new(ModelCatalog::embedded())
    }

    /// Canonicalize a raw model id through the alias table
    ///
    /// A hit is dereferenced once more; when the second lookup yields a
    /// different value that value wins, otherwise the first. The single
    /// extra hop makes resolution idempotent without cycle detection.
    /// Misses return the input unchanged.
    pub fn resolve_alias(&self, raw: &str) -> String {
        let Some(first) = self.aliases.get(&raw.to_lowercase()) else {
            return raw.to_owned();
        };

        match self.aliases.get(&first.to_lowercase()) {
            Some(second) if second != first => second.clone(),
            _ => first.clone(),
        }
    }

    /// Infer the most likely owning provider for a canonical id
    ///
    /// Evaluated in strict priority order, first match wins: the override
    /// table, a `provider/...` path form naming a known provider, a scan of
    /// every provider's mapping table (keys and native values) in catalog
    /// priority order, then bare-prefix heuristics. `None` means the caller
    /// must apply its default-provider policy.
    pub fn infer_provider(&self, canonical: &str) -> Option<&str> {
        let lower = canonical.to_lowercase();

        if let Some(provider) = self.overrides.get(&lower) {
            return Some(provider);
        }

        if let Some((prefix, rest)) = lower.split_once('/')
            && !rest.is_empty()
            && let Some(provider) = self.provider_key(prefix)
        {
            return Some(provider);
        }

        for provider in &self.catalog.provider_priority {
            let Some(table) = self.catalog.providers.get(provider) else {
                continue;
            };
            if table.contains_key(&lower) || table.values().any(|v| v.eq_ignore_ascii_case(canonical)) {
                return Some(provider);
            }
        }

        if !lower.contains('/') {
            for rule in &self.catalog.prefix_rules {
                if lower.starts_with(&rule.prefix) {
                    return Some(&rule.provider);
                }
            }
        }

        None
    }

    /// Rewrite a canonical id into a provider's native model id
    ///
    /// Applies, in order, until one step produces a value: meta-model
    /// substitution, stripping of the target provider's own path prefix,
    /// exact mapping table lookup, normalized fuzzy lookup, and finally
    /// pass-through with a logged warning. Total: never fails, and never
    /// returns an empty string — a blank input is substituted with the
    /// catalog's fallback model. The result is lower-cased unless it is a
    /// path-form id living in a casing-sensitive provider namespace.
    pub fn transform(&self, canonical: &str, provider: &str) -> String {
        let canonical = canonical.trim();
        if canonical.is_empty() {
            let fallback = match self.catalog.fallback_model.trim() {
                "" => crate::catalog::FALLBACK_MODEL,
                configured => configured,
            };
            tracing::warn!(provider, fallback, "blank model id, substituting catalog fallback");
            return self.transform(fallback, provider);
        }

        let lower = canonical.to_lowercase();

        // Meta-models are substituted with a per-provider default when the
        // target cannot serve the meta-model itself
        if let Some(substitutes) = self.catalog.meta_defaults.get(&lower) {
            if strip_prefix_segment(&lower, provider).is_some() {
                return canonical.to_owned();
            }
            if let Some(substitute) = substitutes.get(provider) {
                return finalize(substitute);
            }
        }

        if let Some(rest) = strip_prefix_segment(&lower, provider) {
            return rest.to_owned();
        }

        if let Some(table) = self.catalog.providers.get(provider) {
            if let Some(native) = table.get(&lower) {
                return finalize(native);
            }

            let wanted = normalize(&lower);
            for (key, native) in table {
                if normalize(key) == wanted {
                    return finalize(native);
                }
            }
        }

        tracing::warn!(
            model = %canonical,
            provider,
            "no native mapping for model, passing id through"
        );
        finalize(canonical)
    }

    /// Access the underlying catalog
    pub const fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Canonical spelling of a provider name present in the catalog
    fn provider_key(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.catalog.providers.get_key_value(name) {
            return Some(key);
        }
        self.catalog
            .provider_priority
            .iter()
            .find(|p| *p == name)
            .map(String::as_str)
    }
}

/// Strip a leading `provider/` segment, keeping only non-empty remainders
fn strip_prefix_segment<'a>(id: &'a str, provider: &str) -> Option<&'a str> {
    id.strip_prefix(provider)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
}

/// Casing rule for transform output
///
/// Path-form ids stay in the provider's casing-sensitive namespace;
/// everything else is lower-cased.
fn finalize(id: &str) -> String {
    if id.contains('/') {
        id.to_owned()
    } else {
        id.to_lowercase()
    }
}

/// Normalized form used for fuzzy table matching
///
/// Case folding, separator unification, and stripping of common release
/// suffixes (`-latest`, `:free`, trailing 8-digit dates).
fn normalize(id: &str) -> String {
    let mut normalized = id.to_lowercase().replace(['_', '.'], "-");

    for suffix in ["-latest", ":free"] {
        if let Some(stripped) = normalized.strip_suffix(suffix) {
            normalized = stripped.to_owned();
        }
    }

    if let Some(pos) = normalized.rfind('-') {
        let tail = &normalized[pos + 1..];
        if tail.len() == 8 && tail.chars().all(|c| c.is_ascii_digit()) {
            normalized.truncate(pos);
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> Resolver {
        Resolver::embedded()
    }

    #[test]
    fn alias_resolution_is_idempotent() {
        let resolver = resolver();
        let inputs = ["gpt4", "GPT4", "sonnet", "auto", "gpt-4", "unknown-model", ""];
        for raw in inputs {
            let once = resolver.resolve_alias(raw);
            let twice = resolver.resolve_alias(&once);
            assert_eq!(once, twice, "resolve_alias not idempotent for '{raw}'");
        }
    }

    #[test]
    fn alias_miss_passes_through() {
        assert_eq!(resolver().resolve_alias("some-custom-model"), "some-custom-model");
    }

    #[test]
    fn alias_lookup_ignores_case() {
        assert_eq!(resolver().resolve_alias("Sonnet"), "claude-sonnet-4");
    }

    #[test]
    fn chained_alias_dereferences_one_extra_hop() {
        let mut catalog = ModelCatalog::default();
        catalog.aliases.insert("a".into(), "b".into());
        catalog.aliases.insert("b".into(), "c".into());
        let resolver = Resolver::new(catalog);

        assert_eq!(resolver.resolve_alias("a"), "c");
        assert_eq!(resolver.resolve_alias("b"), "c");
        assert_eq!(resolver.resolve_alias("c"), "c");
    }

    #[test]
    fn override_beats_every_other_rule() {
        // llama-3.3-70b appears in several provider tables; the override
        // pins it to cerebras
        assert_eq!(resolver().infer_provider("llama-3.3-70b"), Some("cerebras"));
        assert_eq!(resolver().infer_provider("openrouter/auto"), Some("openrouter"));
    }

    #[test]
    fn path_form_names_its_provider() {
        assert_eq!(resolver().infer_provider("anthropic/claude-sonnet-4"), Some("anthropic"));
        assert_eq!(resolver().infer_provider("unknownvendor/model"), None);
    }

    #[test]
    fn table_scan_follows_priority_order() {
        // gpt-4o is in both the openai and openrouter tables; openai comes
        // first in the priority list
        assert_eq!(resolver().infer_provider("gpt-4o"), Some("openai"));
    }

    #[test]
    fn prefix_heuristic_is_last_resort() {
        assert_eq!(resolver().infer_provider("claude-9-hypothetical"), Some("anthropic"));
        assert_eq!(resolver().infer_provider("gpt-99"), Some("openai"));
        assert_eq!(resolver().infer_provider("entirely-unknown"), None);
    }

    #[test]
    fn transform_is_total_and_non_empty() {
        let resolver = resolver();
        let providers: Vec<String> = resolver.catalog().providers.keys().cloned().collect();
        let mut models: Vec<String> = resolver
            .catalog()
            .providers
            .values()
            .flat_map(|t| t.keys().cloned())
            .collect();
        models.extend([
            "".into(),
            "   ".into(),
            "never-seen-before".into(),
            "weird/Path/Model".into(),
        ]);

        for provider in &providers {
            for model in &models {
                let native = resolver.transform(model, provider);
                assert!(!native.is_empty(), "empty transform for '{model}'@{provider}");
            }
        }
    }

    #[test]
    fn blank_id_substitutes_catalog_fallback() {
        let resolver = resolver();
        // the fallback is a meta-model, so it lands on each provider's
        // configured default
        assert_eq!(resolver.transform("", "cerebras"), "llama-3.3-70b");
        assert_eq!(resolver.transform("   ", "openai"), "gpt-4o-mini");
        assert_eq!(resolver.transform("", "openrouter"), "openrouter/auto");
    }

    #[test]
    fn blank_id_is_non_empty_even_without_a_configured_fallback() {
        let resolver = Resolver::new(ModelCatalog::default());
        assert!(!resolver.transform("", "openai").is_empty());
    }

    #[test]
    fn meta_model_substitutes_per_provider() {
        let resolver = resolver();
        let native = resolver.transform("openrouter/auto", "cerebras");
        assert_eq!(native, "llama-3.3-70b");
        assert_ne!(native, "openrouter/auto");
    }

    #[test]
    fn meta_model_unchanged_on_its_own_provider() {
        assert_eq!(
            resolver().transform("openrouter/auto", "openrouter"),
            "openrouter/auto"
        );
    }

    #[test]
    fn own_prefix_is_stripped() {
        assert_eq!(
            resolver().transform("cerebras/my-custom-deploy", "cerebras"),
            "my-custom-deploy"
        );
    }

    #[test]
    fn exact_mapping_wins_case_insensitively() {
        assert_eq!(
            resolver().transform("Claude-Sonnet-4", "anthropic"),
            "claude-sonnet-4-20250514"
        );
    }

    #[test]
    fn fuzzy_match_unifies_separators_and_suffixes() {
        let resolver = resolver();
        assert_eq!(
            resolver.transform("claude_sonnet_4-latest", "anthropic"),
            "claude-sonnet-4-20250514"
        );
        assert_eq!(resolver.transform("llama_3.3_70b", "cerebras"), "llama-3.3-70b");
    }

    #[test]
    fn passthrough_keeps_unknown_ids() {
        assert_eq!(
            resolver().transform("Totally-Unknown", "openai"),
            "totally-unknown"
        );
    }

    #[test]
    fn passthrough_preserves_path_form_casing() {
        assert_eq!(
            resolver().transform("Vendor/Casing-Sensitive", "openai"),
            "Vendor/Casing-Sensitive"
        );
    }

    #[test]
    fn normalize_strips_date_suffix() {
        assert_eq!(normalize("claude-sonnet-4-20250514"), "claude-sonnet-4");
        assert_eq!(normalize("llama-3.3-70b"), "llama-3-3-70b");
    }
}
