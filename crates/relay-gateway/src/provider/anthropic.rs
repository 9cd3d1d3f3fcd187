//! Anthropic Messages API provider adapter

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use relay_config::ProviderConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{Provider, ProviderCapabilities, classify_status, retry_after_seconds};
use crate::error::GatewayError;
use crate::types::{CompletionRequest, CompletionResponse, FinishReason, Role, StreamEvent, Usage};
use crate::EventStream;

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API requires an explicit generation budget
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    streaming: bool,
}

impl AnthropicProvider {
    /// Create from provider configuration
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded default base URL is invalid (which cannot
    /// happen).
    pub fn new(name: String, config: &ProviderConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL).expect("valid default URL"));

        Self {
            name,
            client: Client::new(),
            base_url,
            api_key: config.api_key.clone(),
            streaming: config.streaming,
        }
    }

    fn messages_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/messages")
    }

    async fn send(&self, wire: &WireRequest<'_>) -> Result<reqwest::Response, GatewayError> {
        let mut builder = self
            .client
            .post(self.messages_url())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(wire);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(provider = %self.name, error = %e, "upstream request failed");
            GatewayError::Upstream {
                provider: self.name.clone(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_seconds(&response);
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.name, status = %status, "upstream returned error");
            return Err(classify_status(&self.name, status, retry_after, &body));
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: self.streaming,
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, GatewayError> {
        let wire = WireRequest::from_request(request, false);
        let response = self.send(&wire).await?;

        let wire_response: WireResponse = response.json().await.map_err(|e| GatewayError::Upstream {
            provider: self.name.clone(),
            message: format!("failed to parse response: {e}"),
        })?;

        Ok(wire_response.into_response())
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<EventStream, GatewayError> {
        let wire = WireRequest::from_request(request, true);
        let response = self.send(&wire).await?;

        let provider = self.name.clone();
        // input_tokens arrive in message_start, output_tokens in
        // message_delta; stitch them into one Usage event
        let mut input_tokens: u32 = 0;
        let events = response
            .bytes_stream()
            .eventsource()
            .map(move |result| match result {
                Ok(event) => match serde_json::from_str::<WireStreamEvent>(&event.data) {
                    Ok(parsed) => parsed.into_events(&mut input_tokens),
                    Err(e) => {
                        tracing::debug!(error = %e, data = %event.data, "skipping unparseable SSE chunk");
                        vec![]
                    }
                },
                Err(e) => vec![Err(GatewayError::Streaming {
                    provider: provider.clone(),
                    message: e.to_string(),
                })],
            })
            .flat_map(futures_util::stream::iter);

        Ok(Box::pin(events))
    }
}

/// Messages API wire request
#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> WireRequest<'a> {
    /// System messages move to the top-level `system` field; multiple
    /// system messages are joined with blank lines
    fn from_request(request: &'a CompletionRequest, stream: bool) -> Self {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage {
                role: match m.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                },
                content: &m.content,
            })
            .collect();

        Self {
            model: &request.model,
            max_tokens: request.params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            temperature: request.params.temperature,
            top_p: request.params.top_p,
            stop_sequences: request.params.stop.as_deref(),
            stream: stream.then_some(true),
        }
    }
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<WireContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Clone, Copy)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl WireUsage {
    const fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.input_tokens,
            completion_tokens: self.output_tokens,
            total_tokens: self.input_tokens + self.output_tokens,
        }
    }
}

impl WireResponse {
    fn into_response(self) -> CompletionResponse {
        let content = self
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        CompletionResponse {
            id: self.id,
            model: self.model,
            content,
            finish_reason: self.stop_reason.as_deref().and_then(FinishReason::parse),
            usage: self.usage.map(WireUsage::into_usage),
        }
    }
}

/// Messages API stream event, discriminated by `type`
#[derive(Deserialize)]
#[serde(tag = "type")]
enum WireStreamEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: WireMessageStart },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: WireTextDelta },
    #[serde(rename = "message_delta")]
    MessageDelta {
        #[serde(default)]
        usage: Option<WireUsage>,
    },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(other)]
    Ignored,
}

#[derive(Deserialize)]
struct WireMessageStart {
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireTextDelta {
    #[serde(default)]
    text: Option<String>,
}

impl WireStreamEvent {
    fn into_events(self, input_tokens: &mut u32) -> Vec<Result<StreamEvent, GatewayError>> {
        match self {
            Self::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    *input_tokens = usage.input_tokens;
                }
                vec![]
            }
            Self::ContentBlockDelta { delta } => delta
                .text
                .filter(|t| !t.is_empty())
                .map(|t| vec![Ok(StreamEvent::Delta(t))])
                .unwrap_or_default(),
            Self::MessageDelta { usage } => usage
                .map(|u| {
                    let usage = Usage {
                        prompt_tokens: *input_tokens,
                        completion_tokens: u.output_tokens,
                        total_tokens: *input_tokens + u.output_tokens,
                    };
                    vec![Ok(StreamEvent::Usage(usage))]
                })
                .unwrap_or_default(),
            Self::MessageStop => vec![Ok(StreamEvent::Done)],
            Self::Ignored => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn system_messages_move_to_the_system_field() {
        let request = CompletionRequest::new(
            "claude-sonnet-4-20250514",
            vec![Message::system("be brief"), Message::user("hi")],
        );
        let wire = WireRequest::from_request(&request, false);
        assert_eq!(wire.system.as_deref(), Some("be brief"));
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].role, "user");
        assert_eq!(wire.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn response_joins_text_blocks() {
        let raw = serde_json::json!({
            "id": "msg_1",
            "model": "claude-sonnet-4-20250514",
            "content": [{"type": "text", "text": "hel"}, {"type": "text", "text": "lo"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 2}
        });

        let wire: WireResponse = serde_json::from_value(raw).unwrap();
        let response = wire.into_response();
        assert_eq!(response.content, "hello");
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.unwrap().total_tokens, 12);
    }

    #[test]
    fn stream_events_stitch_usage_from_both_ends() {
        let mut input = 0u32;

        let start: WireStreamEvent = serde_json::from_value(serde_json::json!({
            "type": "message_start",
            "message": {"usage": {"input_tokens": 7, "output_tokens": 0}}
        }))
        .unwrap();
        assert!(start.into_events(&mut input).is_empty());

        let delta: WireStreamEvent = serde_json::from_value(serde_json::json!({
            "type": "message_delta",
            "usage": {"output_tokens": 5},
            "delta": {"stop_reason": "end_turn"}
        }))
        .unwrap();
        let events = delta.into_events(&mut input);
        assert!(
            matches!(events[0], Ok(StreamEvent::Usage(u)) if u.prompt_tokens == 7 && u.completion_tokens == 5)
        );
    }
}
