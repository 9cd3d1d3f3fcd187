//! Lazily-populated registry of per-provider breakers
//!
//! The registry is the sole mutation path for breaker state. Entries are
//! created on first reference and live for the process lifetime; all
//! methods are safe under concurrent invocation from many in-flight
//! requests — a lost race costs transition precision, never the state
//! invariant.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use relay_config::CircuitBreakerConfig;

use crate::breaker::{Breaker, BreakerSnapshot, Transition};
use crate::store::BreakerStore;

/// Registry of circuit breakers keyed by provider name
pub struct BreakerRegistry {
    breakers: DashMap<String, Mutex<Breaker>>,
    config: CircuitBreakerConfig,
    store: Option<Arc<dyn BreakerStore>>,
}

impl BreakerRegistry {
    /// Create a registry with purely local state
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
            store: None,
        }
    }

    /// Create a registry mirrored to a shared store
    ///
    /// Mirroring requires a Tokio runtime, since persists run as spawned
    /// best-effort tasks off the request path.
    pub fn with_store(config: CircuitBreakerConfig, store: Arc<dyn BreakerStore>) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
            store: Some(store),
        }
    }

    /// Seed breakers for the named providers from the shared store
    ///
    /// Called once at startup so a restarted instance resumes from the
    /// last known state instead of defaulting to healthy. Load failures
    /// are logged and leave the provider at the healthy default.
    pub async fn hydrate<I, S>(&self, providers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(store) = &self.store else {
            return;
        };

        for provider in providers {
            let provider = provider.as_ref();
            match store.load(provider).await {
                Ok(Some(persisted)) => {
                    tracing::info!(
                        provider,
                        state = persisted.state.as_str(),
                        "resumed breaker state from shared store"
                    );
                    self.breakers
                        .insert(provider.to_owned(), Mutex::new(Breaker::from_persisted(&persisted)));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(provider, error = %e, "breaker hydration skipped");
                }
            }
        }
    }

    /// Whether a provider may be attempted right now
    ///
    /// Closed and half-open breakers admit traffic; an open breaker whose
    /// cooldown has elapsed transitions to half-open and admits the probe,
    /// otherwise the answer is false with no side effects.
    pub fn should_attempt(&self, provider: &str) -> bool {
        let entry = self
            .breakers
            .entry(provider.to_owned())
            .or_insert_with(|| Mutex::new(Breaker::new()));
        let mut breaker = entry.lock().unwrap_or_else(PoisonError::into_inner);

        let (allowed, transition) = breaker.should_attempt_at(now_secs(), &self.config);
        if let Some(transition) = transition {
            log_transition(provider, transition);
            self.mirror(provider, &breaker);
        }
        allowed
    }

    /// Record a successful request to a provider
    pub fn record_success(&self, provider: &str) {
        self.record(provider, true);
    }

    /// Record a failed request to a provider
    pub fn record_failure(&self, provider: &str) {
        self.record(provider, false);
    }

    /// Observable state for a provider, creating the default if absent
    pub fn snapshot(&self, provider: &str) -> BreakerSnapshot {
        let entry = self
            .breakers
            .entry(provider.to_owned())
            .or_insert_with(|| Mutex::new(Breaker::new()));
        let breaker = entry.lock().unwrap_or_else(PoisonError::into_inner);
        breaker.snapshot_at(now_secs(), &self.config)
    }

    /// Operational override: return one provider's breaker to closed
    pub fn reset(&self, provider: &str) {
        if let Some(entry) = self.breakers.get(provider) {
            let mut breaker = entry.lock().unwrap_or_else(PoisonError::into_inner);
            *breaker = Breaker::new();
            tracing::info!(provider, "breaker reset by operator");
            self.mirror(provider, &breaker);
        }
    }

    /// Operational override: return every breaker to closed
    pub fn reset_all(&self) {
        for entry in &self.breakers {
            let mut breaker = entry.value().lock().unwrap_or_else(PoisonError::into_inner);
            *breaker = Breaker::new();
            self.mirror(entry.key(), &breaker);
        }
        tracing::info!("all breakers reset by operator");
    }

    fn record(&self, provider: &str, success: bool) {
        let entry = self
            .breakers
            .entry(provider.to_owned())
            .or_insert_with(|| Mutex::new(Breaker::new()));
        let mut breaker = entry.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(transition) = breaker.record_at(now_secs(), success, &self.config) {
            log_transition(provider, transition);
        }
        self.mirror(provider, &breaker);
    }

    /// Best-effort async write of a breaker's state to the shared store
    fn mirror(&self, provider: &str, breaker: &Breaker) {
        let Some(store) = &self.store else {
            return;
        };

        let store = Arc::clone(store);
        let provider = provider.to_owned();
        let persisted = breaker.to_persisted();

        tokio::spawn(async move {
            if let Err(e) = store.persist(&provider, &persisted).await {
                tracing::debug!(provider, error = %e, "breaker mirror write failed");
            }
        });
    }
}

fn log_transition(provider: &str, transition: Transition) {
    match transition.to {
        crate::breaker::CircuitState::Open => tracing::warn!(
            provider,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            reason = transition.reason,
            "circuit breaker opened"
        ),
        _ => tracing::info!(
            provider,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            reason = transition.reason,
            "circuit breaker transition"
        ),
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::CircuitState;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
            ..CircuitBreakerConfig::default()
        }
    }

    #[test]
    fn unknown_provider_defaults_to_closed() {
        let registry = BreakerRegistry::new(config());
        assert!(registry.should_attempt("fresh"));
        assert_eq!(registry.snapshot("fresh").state, CircuitState::Closed);
    }

    #[test]
    fn failures_open_and_gate_a_provider() {
        let registry = BreakerRegistry::new(config());
        for _ in 0..3 {
            registry.record_failure("flaky");
        }

        assert!(!registry.should_attempt("flaky"));
        let snapshot = registry.snapshot("flaky");
        assert_eq!(snapshot.state, CircuitState::Open);
        assert!(snapshot.seconds_until_retry > 0);
    }

    #[test]
    fn providers_are_tracked_independently() {
        let registry = BreakerRegistry::new(config());
        for _ in 0..3 {
            registry.record_failure("bad");
        }

        assert!(!registry.should_attempt("bad"));
        assert!(registry.should_attempt("good"));
    }

    #[test]
    fn reset_returns_a_provider_to_closed() {
        let registry = BreakerRegistry::new(config());
        for _ in 0..3 {
            registry.record_failure("flaky");
        }
        assert!(!registry.should_attempt("flaky"));

        registry.reset("flaky");
        assert!(registry.should_attempt("flaky"));
        assert_eq!(registry.snapshot("flaky").failure_count, 0);
    }

    #[test]
    fn reset_all_clears_every_breaker() {
        let registry = BreakerRegistry::new(config());
        for provider in ["a", "b"] {
            for _ in 0..3 {
                registry.record_failure(provider);
            }
        }

        registry.reset_all();
        assert!(registry.should_attempt("a"));
        assert!(registry.should_attempt("b"));
    }

    #[tokio::test]
    async fn hydrate_without_store_is_a_no_op() {
        let registry = BreakerRegistry::new(config());
        registry.hydrate(["a", "b"]).await;
        assert!(registry.should_attempt("a"));
    }
}
