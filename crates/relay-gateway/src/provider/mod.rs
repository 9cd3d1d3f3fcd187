//! Provider trait and HTTP adapters for upstream backends

pub mod anthropic;
pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::GatewayError;
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// Lazy, single-pass sequence of stream events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, GatewayError>> + Send>>;

/// Capabilities advertised by a provider adapter
#[derive(Debug, Clone, Copy)]
pub struct ProviderCapabilities {
    /// Whether the adapter can stream responses
    pub streaming: bool,
}

/// Trait implemented by each upstream backend
///
/// One adapter instance per configured provider name. Implementations
/// perform exactly one upstream call per invocation and map transport
/// failures onto the gateway error taxonomy; retry policy lives in the
/// orchestrator, never here.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Configured provider name
    fn name(&self) -> &str;

    /// Advertised capabilities
    fn capabilities(&self) -> ProviderCapabilities;

    /// Send a non-streaming completion request
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, GatewayError>;

    /// Send a streaming completion request
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<EventStream, GatewayError>;
}

/// Wrap a completed reply as a single-shot event stream
///
/// Serves streaming callers from providers without streaming support.
pub fn single_shot_stream(response: CompletionResponse) -> EventStream {
    let mut events = vec![Ok(StreamEvent::Delta(response.content))];
    if let Some(usage) = response.usage {
        events.push(Ok(StreamEvent::Usage(usage)));
    }
    events.push(Ok(StreamEvent::Done));
    Box::pin(futures_util::stream::iter(events))
}

/// Map an upstream HTTP status onto the error taxonomy
pub(crate) fn classify_status(
    provider: &str,
    status: reqwest::StatusCode,
    retry_after: Option<u64>,
    body: &str,
) -> GatewayError {
    match status.as_u16() {
        401 | 403 => GatewayError::Auth {
            provider: provider.to_owned(),
        },
        429 => GatewayError::RateLimited {
            provider: provider.to_owned(),
            retry_after,
        },
        400..=499 => GatewayError::InvalidRequest(format!(
            "{provider} rejected the request ({status}): {body}"
        )),
        _ => GatewayError::Upstream {
            provider: provider.to_owned(),
            message: format!("{status}: {body}"),
        },
    }
}

/// Read a `Retry-After` header as whole seconds
pub(crate) fn retry_after_seconds(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::types::Usage;

    #[test]
    fn rate_limit_and_auth_statuses_classify() {
        let rate = classify_status("p", reqwest::StatusCode::TOO_MANY_REQUESTS, Some(30), "");
        assert!(matches!(
            rate,
            GatewayError::RateLimited {
                retry_after: Some(30),
                ..
            }
        ));

        let auth = classify_status("p", reqwest::StatusCode::UNAUTHORIZED, None, "");
        assert!(matches!(auth, GatewayError::Auth { .. }));
        assert!(!auth.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable_upstream() {
        let error = classify_status("p", reqwest::StatusCode::BAD_GATEWAY, None, "oops");
        assert!(matches!(error, GatewayError::Upstream { .. }));
        assert!(error.is_retryable());
    }

    #[test]
    fn client_errors_abort() {
        let error = classify_status("p", reqwest::StatusCode::UNPROCESSABLE_ENTITY, None, "bad");
        assert!(matches!(error, GatewayError::InvalidRequest(_)));
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn single_shot_stream_replays_the_reply() {
        let response = CompletionResponse {
            id: "r1".into(),
            model: "m".into(),
            content: "hello".into(),
            finish_reason: None,
            usage: Some(Usage {
                prompt_tokens: 1,
                completion_tokens: 2,
                total_tokens: 3,
            }),
        };

        let events: Vec<_> = single_shot_stream(response).collect().await;
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Ok(StreamEvent::Delta(ref d)) if d == "hello"));
        assert!(matches!(events[1], Ok(StreamEvent::Usage(_))));
        assert!(matches!(events[2], Ok(StreamEvent::Done)));
    }
}
