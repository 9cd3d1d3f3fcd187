//! Shared breaker-state mirror
//!
//! A best-effort cache, never a source of truth: load failures fall back
//! to local defaults and persist failures are logged, not surfaced.

use std::time::Duration;

use async_trait::async_trait;
use relay_config::MirrorConfig;
use thiserror::Error;

use crate::breaker::PersistedBreaker;

/// Mirror errors, visible only in logs
#[derive(Debug, Error)]
pub enum StoreError {
    /// Valkey connection or command error
    #[error("mirror backend: {0}")]
    Backend(String),
    /// Serialization error
    #[error("mirror serialization: {0}")]
    Serialization(String),
}

/// External store for breaker state, keyed by provider name
#[async_trait]
pub trait BreakerStore: Send + Sync {
    /// Fetch the last mirrored state for a provider
    async fn load(&self, provider: &str) -> Result<Option<PersistedBreaker>, StoreError>;

    /// Write a provider's state with the configured TTL
    async fn persist(&self, provider: &str, state: &PersistedBreaker) -> Result<(), StoreError>;
}

/// Valkey/Redis-backed breaker store
#[derive(Clone)]
pub struct ValkeyStore {
    client: redis::Client,
    ttl: Duration,
    key_prefix: String,
}

impl ValkeyStore {
    /// Create a store from a connection URL
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid
    pub fn new(url: &str, ttl: Duration, key_prefix: Option<String>) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Backend(format!("invalid URL: {e}")))?;

        Ok(Self {
            client,
            ttl,
            key_prefix: key_prefix.unwrap_or_else(|| "relay:breaker".to_owned()),
        })
    }

    /// Create a store from the mirror configuration section
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL is rejected by the client
    pub fn from_config(config: &MirrorConfig) -> Result<Self, StoreError> {
        Self::new(config.url.as_str(), config.ttl, config.key_prefix.clone())
    }

    fn key(&self, provider: &str) -> String {
        format!("{}:{provider}", self.key_prefix)
    }
}

#[async_trait]
impl BreakerStore for ValkeyStore {
    async fn load(&self, provider: &str) -> Result<Option<PersistedBreaker>, StoreError> {
        use redis::AsyncCommands;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Backend(format!("connection failed: {e}")))?;

        let raw: Option<String> = conn
            .get(self.key(provider))
            .await
            .map_err(|e| StoreError::Backend(format!("GET failed: {e}")))?;

        raw.map(|data| {
            serde_json::from_str(&data).map_err(|e| StoreError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn persist(&self, provider: &str, state: &PersistedBreaker) -> Result<(), StoreError> {
        use redis::AsyncCommands;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Backend(format!("connection failed: {e}")))?;

        let data =
            serde_json::to_string(state).map_err(|e| StoreError::Serialization(e.to_string()))?;

        conn.set_ex::<_, _, ()>(self.key(provider), data, self.ttl.as_secs())
            .await
            .map_err(|e| StoreError::Backend(format!("SETEX failed: {e}")))?;

        Ok(())
    }
}
