//! Provider capability registry
//!
//! Decouples "who can serve what" from breaker health and from model-id
//! transformation. Populated once at startup and immutable afterward; a
//! provider missing from the registry is an `UnknownProvider` condition,
//! never a crash.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::provider::Provider;

/// Why a provider profile was rejected at registration
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Provider name is empty
    #[error("provider name must not be empty")]
    EmptyName,
    /// Another profile already uses the name
    #[error("provider '{0}' is already registered")]
    Duplicate(String),
    /// Profile declares streaming but the adapter cannot stream
    #[error("provider '{0}' declares streaming support its adapter does not advertise")]
    StreamingUnsupported(String),
}

/// Registered capability profile for one provider
pub struct ProviderProfile {
    /// The dispatch adapter
    pub provider: Arc<dyn Provider>,
    /// Hard per-attempt timeout for this provider
    pub timeout: Duration,
    /// Whether streaming dispatch may be used
    pub streaming: bool,
}

/// Immutable-after-startup table of provider profiles
pub struct ProviderRegistry {
    profiles: HashMap<String, ProviderProfile>,
    default_timeout: Duration,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            profiles: HashMap::new(),
            default_timeout,
        }
    }

    /// Register a provider profile
    ///
    /// Validation failure rejects this one provider; callers log and
    /// continue so a single bad entry never aborts startup of the rest.
    pub fn register(
        &mut self,
        name: String,
        provider: Arc<dyn Provider>,
        timeout: Option<Duration>,
        streaming: bool,
    ) -> Result<(), RegistrationError> {
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if self.profiles.contains_key(&name) {
            return Err(RegistrationError::Duplicate(name));
        }
        if streaming && !provider.capabilities().streaming {
            return Err(RegistrationError::StreamingUnsupported(name));
        }

        self.profiles.insert(
            name,
            ProviderProfile {
                provider,
                timeout: timeout.unwrap_or(self.default_timeout),
                streaming,
            },
        );
        Ok(())
    }

    /// Look up a profile by provider name
    pub fn get(&self, name: &str) -> Option<&ProviderProfile> {
        self.profiles.get(name)
    }

    /// Whether a provider is registered
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Configured timeout for a provider, defaulting for unknown names
    pub fn timeout_for(&self, name: &str) -> Duration {
        self.profiles
            .get(name)
            .map_or(self.default_timeout, |p| p.timeout)
    }

    /// Registered provider names, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}
