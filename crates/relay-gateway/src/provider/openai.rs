//! OpenAI-compatible provider adapter
//!
//! Serves any backend speaking the chat-completions protocol: OpenAI
//! itself, and OpenRouter, Cerebras, Groq, and similar third parties via
//! `base_url`.

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
use crate::types::{CompletionRequest, CompletionResponse, FinishReason, Message, StreamEvent, Usage};
use crate::EventStream;

/// Default OpenAI API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible provider
pub struct OpenAiCompatProvider {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    streaming: bool,
}

impl OpenAiCompatProvider {
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

    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    async fn send(&self, wire: &WireRequest<'_>) -> Result<reqwest::Response, GatewayError> {
        let mut builder = self.client.post(self.completions_url()).json(wire);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
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
impl Provider for OpenAiCompatProvider {
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

        Ok(wire_response.into_response(&request.model))
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<EventStream, GatewayError> {
        let wire = WireRequest::from_request(request, true);
        let response = self.send(&wire).await?;

        let provider = self.name.clone();
        let events = response
            .bytes_stream()
            .eventsource()
            .map(move |result| match result {
                Ok(event) => {
                    let data = event.data.trim().to_owned();
                    if data == "[DONE]" {
                        return vec![Ok(StreamEvent::Done)];
                    }
                    match serde_json::from_str::<WireChunk>(&data) {
                        Ok(chunk) => chunk.into_events(),
                        Err(e) => {
                            tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
                            vec![]
                        }
                    }
                }
                Err(e) => vec![Err(GatewayError::Streaming {
                    provider: provider.clone(),
                    message: e.to_string(),
                })],
            })
            .flat_map(futures_util::stream::iter);

        Ok(Box::pin(events))
    }
}

/// Chat-completions wire request
#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a CompletionRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            temperature: request.params.temperature,
            top_p: request.params.top_p,
            max_tokens: request.params.max_tokens,
            stop: request.params.stop.as_deref(),
            stream: stream.then_some(true),
        }
    }
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl WireUsage {
    const fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}

impl WireResponse {
    fn into_response(mut self, fallback_model: &str) -> CompletionResponse {
        let choice = if self.choices.is_empty() {
            None
        } else {
            Some(self.choices.remove(0))
        };

        CompletionResponse {
            id: self.id,
            model: self.model.unwrap_or_else(|| fallback_model.to_owned()),
            content: choice
                .as_ref()
                .and_then(|c| c.message.content.clone())
                .unwrap_or_default(),
            finish_reason: choice
                .and_then(|c| c.finish_reason)
                .as_deref()
                .and_then(FinishReason::parse),
            usage: self.usage.map(WireUsage::into_usage),
        }
    }
}

/// Streaming chunk on the chat-completions wire
#[derive(Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChunkChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChunkChoice {
    delta: WireDelta,
}

#[derive(Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

impl WireChunk {
    fn into_events(self) -> Vec<Result<StreamEvent, GatewayError>> {
        let mut events = Vec::new();
        for choice in self.choices {
            if let Some(content) = choice.delta.content
                && !content.is_empty()
            {
                events.push(Ok(StreamEvent::Delta(content)));
            }
        }
        if let Some(usage) = self.usage {
            events.push(Ok(StreamEvent::Usage(usage.into_usage())));
        }
        events
    }
}
