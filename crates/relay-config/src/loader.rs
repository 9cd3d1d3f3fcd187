use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, placeholder expansion
    /// fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded = crate::env::expand_env(&raw)
            .map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self =
            toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            providers = config.providers.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is configured, a fallback or
    /// default provider is unknown, a model pattern is not valid regex,
    /// or a breaker threshold is out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be configured");
        }

        for (name, provider) in &self.providers {
            for pattern in provider.models.include.iter().chain(&provider.models.exclude) {
                regex::Regex::new(pattern)
                    .map_err(|e| anyhow::anyhow!("invalid model pattern for provider '{name}': {e}"))?;
            }
        }

        if let Some(default) = &self.resolver.default_provider
            && !self.providers.contains_key(default)
        {
            anyhow::bail!("default provider '{default}' is not configured");
        }

        let fallback_lists = self
            .failover
            .fallbacks
            .values()
            .chain(std::iter::once(&self.failover.default_fallbacks));
        for list in fallback_lists {
            for name in list {
                if !self.providers.contains_key(name) {
                    anyhow::bail!("fallback provider '{name}' is not configured");
                }
            }
        }

        if self.failover.max_attempts == 0 {
            anyhow::bail!("failover.max_attempts must be at least 1");
        }

        let breaker = &self.circuit_breaker;
        if breaker.failure_threshold == 0
            || breaker.success_threshold == 0
            || breaker.half_open_tolerance == 0
        {
            anyhow::bail!("circuit breaker thresholds must be non-zero");
        }
        if !(breaker.failure_rate > 0.0 && breaker.failure_rate <= 1.0) {
            anyhow::bail!("circuit_breaker.failure_rate must be within (0, 1]");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Config;

    fn parse(toml: &str) -> Config {
        toml::from_str(toml).expect("config parses")
    }

    #[test]
    fn minimal_config_validates() {
        let config = parse(
            r#"
            [providers.openai]
            type = "openai"
            "#,
        );
        config.validate().unwrap();
        assert_eq!(config.default_timeout.as_secs(), 120);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
    }

    #[test]
    fn empty_config_is_rejected() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_fallback_is_rejected() {
        let config = parse(
            r#"
            [providers.openai]
            type = "openai"

            [failover]
            default_fallbacks = ["missing"]
            "#,
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn invalid_model_pattern_is_rejected() {
        let config = parse(
            r#"
            [providers.openai]
            type = "openai"
            models.include = ["gpt-(4"]
            "#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn breaker_rate_bounds_are_enforced() {
        let config = parse(
            r#"
            [providers.openai]
            type = "openai"

            [circuit_breaker]
            failure_rate = 1.5
            "#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn durations_accept_human_strings() {
        let config = parse(
            r#"
            default_timeout = "90s"

            [providers.cerebras]
            type = "openai"
            base_url = "https://api.cerebras.ai/v1"
            timeout = "30s"

            [circuit_breaker]
            cooldown = "2m"
            "#,
        );
        assert_eq!(config.default_timeout.as_secs(), 90);
        assert_eq!(config.providers["cerebras"].timeout.unwrap().as_secs(), 30);
        assert_eq!(config.circuit_breaker.cooldown.as_secs(), 120);
    }
}
