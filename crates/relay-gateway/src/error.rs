use std::time::Duration;

use thiserror::Error;

/// Errors produced by the routing core
///
/// The orchestrator is the only place that decides retry-vs-abort;
/// identity resolution and capability lookups never raise, so this
/// taxonomy is the single classification chokepoint. Raw transport
/// errors never cross the `route()` boundary unwrapped.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Requested or candidate provider is not in the capability registry
    #[error("unknown provider: {provider}")]
    UnknownProvider { provider: String },

    /// The provider's breaker rejected the attempt before dispatch
    #[error("circuit open for provider {provider}, retry in {retry_in}s")]
    CircuitOpen { provider: String, retry_in: u64 },

    /// The per-provider timeout elapsed before the call finished
    #[error("provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    /// The provider throttled the request
    #[error("provider {provider} rate limited the request")]
    RateLimited {
        provider: String,
        /// Seconds the provider asked us to wait, when advertised
        retry_after: Option<u64>,
    },

    /// Transient upstream failure: 5xx, connection reset, protocol error
    #[error("upstream error from {provider}: {message}")]
    Upstream { provider: String, message: String },

    /// Failure while consuming an established response stream
    #[error("streaming error from {provider}: {message}")]
    Streaming { provider: String, message: String },

    /// The provider rejected our credentials
    #[error("authentication rejected by provider {provider}")]
    Auth { provider: String },

    /// Caller-side request defect; switching providers cannot fix it
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Every candidate in the failover chain failed
    #[error("all providers failed for model {model} (attempted: {})", attempted.join(", "))]
    AllProvidersFailed {
        model: String,
        /// Providers attempted, in chain order
        attempted: Vec<String>,
        /// The last classified failure
        #[source]
        last: Box<GatewayError>,
    },

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Whether trying the next provider in the chain is appropriate
    ///
    /// Auth and malformed-request failures abort the chain: they are
    /// caller-side defects no alternate provider will fix.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::Upstream { .. }
                | Self::Streaming { .. }
        )
    }

    /// Provider the error is attributed to, when there is one
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::UnknownProvider { provider }
            | Self::CircuitOpen { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::Upstream { provider, .. }
            | Self::Streaming { provider, .. }
            | Self::Auth { provider } => Some(provider),
            Self::InvalidRequest(_) | Self::AllProvidersFailed { .. } | Self::Internal(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classes_are_retryable() {
        let retryable = [
            GatewayError::Timeout {
                provider: "a".into(),
                timeout: Duration::from_secs(1),
            },
            GatewayError::RateLimited {
                provider: "a".into(),
                retry_after: Some(30),
            },
            GatewayError::Upstream {
                provider: "a".into(),
                message: "502".into(),
            },
            GatewayError::Streaming {
                provider: "a".into(),
                message: "reset".into(),
            },
        ];
        for error in retryable {
            assert!(error.is_retryable(), "{error} should be retryable");
        }
    }

    #[test]
    fn caller_side_classes_abort() {
        let fatal = [
            GatewayError::Auth { provider: "a".into() },
            GatewayError::InvalidRequest("bad".into()),
            GatewayError::UnknownProvider { provider: "a".into() },
        ];
        for error in fatal {
            assert!(!error.is_retryable(), "{error} should not be retryable");
        }
    }

    #[test]
    fn aggregate_error_names_the_chain() {
        let error = GatewayError::AllProvidersFailed {
            model: "gpt-4".into(),
            attempted: vec!["openai".into(), "openrouter".into()],
            last: Box::new(GatewayError::Upstream {
                provider: "openrouter".into(),
                message: "503".into(),
            }),
        };
        let rendered = error.to_string();
        assert!(rendered.contains("gpt-4"));
        assert!(rendered.contains("openai, openrouter"));
    }
}
