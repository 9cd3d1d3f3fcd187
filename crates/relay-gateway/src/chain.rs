//! Failover-chain assembly helpers
//!
//! A chain is an ephemeral ordered list of candidate provider names for
//! one request. Static model eligibility lives here; health filtering is
//! the breaker registry's call.

use regex::Regex;
use relay_config::ModelPatterns;

/// Compiled model eligibility filter for one provider
///
/// Capability, not health: a model excluded here is never served by the
/// provider regardless of its circuit state.
#[derive(Debug, Default)]
pub struct ModelFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl ModelFilter {
    /// Compile a filter from configured patterns
    pub fn from_patterns(patterns: &ModelPatterns) -> Result<Self, regex::Error> {
        Ok(Self {
            include: compile(&patterns.include)?,
            exclude: compile(&patterns.exclude)?,
        })
    }

    /// Whether the provider may serve this model
    pub fn allows(&self, model: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(model)) {
            return false;
        }
        !self.exclude.iter().any(|re| re.is_match(model))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p)).collect()
}

/// Deduplicate candidate names preserving first-occurrence order
pub(crate) fn dedupe(candidates: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !seen.contains(&candidate) {
            seen.push(candidate);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(include: &[&str], exclude: &[&str]) -> ModelPatterns {
        ModelPatterns {
            include: include.iter().map(|s| (*s).to_owned()).collect(),
            exclude: exclude.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn empty_filter_allows_everything() {
        let filter = ModelFilter::from_patterns(&ModelPatterns::default()).unwrap();
        assert!(filter.allows("anything"));
    }

    #[test]
    fn include_restricts_to_matches() {
        let filter = ModelFilter::from_patterns(&patterns(&["^llama-"], &[])).unwrap();
        assert!(filter.allows("llama-3.3-70b"));
        assert!(!filter.allows("gpt-4"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let filter = ModelFilter::from_patterns(&patterns(&["^gpt-"], &["preview"])).unwrap();
        assert!(filter.allows("gpt-4o"));
        assert!(!filter.allows("gpt-4-preview"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(ModelFilter::from_patterns(&patterns(&["("], &[])).is_err());
    }

    #[test]
    fn dedupe_preserves_first_occurrence_order() {
        let chain = dedupe(vec![
            "a".into(),
            "b".into(),
            "a".into(),
            "c".into(),
            "b".into(),
        ]);
        assert_eq!(chain, ["a", "b", "c"]);
    }
}
