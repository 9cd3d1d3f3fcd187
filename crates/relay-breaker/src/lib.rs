//! Per-provider circuit breakers for Relay
//!
//! One CLOSED/OPEN/HALF_OPEN state machine per provider name, tracking
//! consecutive outcomes and a sliding failure-rate window. State is owned
//! exclusively by the registry and mutated only through `record_success`/
//! `record_failure`; an optional Valkey mirror shares it across instances
//! best-effort.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod breaker;
mod registry;
pub mod store;

pub use breaker::{BreakerSnapshot, CircuitState, PersistedBreaker};
pub use registry::BreakerRegistry;
pub use store::{BreakerStore, StoreError, ValkeyStore};
