//! Canonical request/response types
//!
//! Provider-agnostic shapes that every wire format converts to and from.
//! This core routes requests; it does not translate tool schemas or
//! multimodal content, so messages carry plain text.

pub mod message;
pub mod request;
pub mod response;
pub mod stream;

pub use message::{Message, Role};
pub use request::{CompletionParams, CompletionRequest};
pub use response::{CompletionResponse, FinishReason, Usage};
pub use stream::StreamEvent;
