//! Routing core of the Relay gateway
//!
//! Composes the identity resolver, provider capability registry, and
//! circuit breaker registry into a failover orchestrator: one `Gateway`
//! object, constructed from configuration at startup and handed by
//! reference to all request-handling code. Dispatches a chat-completion
//! request to an ordered chain of candidate providers, rewriting the
//! model id per provider and advancing past retryable failures.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod chain;
pub mod error;
pub mod gateway;
pub mod provider;
pub mod registry;
pub mod types;

pub use error::GatewayError;
pub use gateway::{Gateway, RouteInfo, RoutedResponse};
pub use provider::{EventStream, Provider, ProviderCapabilities};
pub use registry::{ProviderProfile, ProviderRegistry, RegistrationError};
pub use types::{
    CompletionParams, CompletionRequest, CompletionResponse, FinishReason, Message, Role,
    StreamEvent, Usage,
};
