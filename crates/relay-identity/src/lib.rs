//! Model identity resolution for Relay
//!
//! Canonicalizes caller-supplied model strings, infers the most likely
//! owning provider, and rewrites canonical ids into each provider's native
//! format. Every operation is pure and total: absence of a mapping is the
//! pass-through default, never an error. The mapping tables themselves are
//! data — a JSON catalog asset — not code.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod catalog;
pub mod resolver;

pub use catalog::{CatalogError, ModelCatalog};
pub use resolver::Resolver;
