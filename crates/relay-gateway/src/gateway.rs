//! The failover orchestrator
//!
//! Owns the identity resolver, provider registry, and breaker registry —
//! one runtime object constructed at startup and shared by reference.
//! Candidates are tried strictly in chain order, never concurrently: a
//! deliberate trade of worst-case latency for determinism and for not
//! multiplying billable upstream calls per request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use relay_breaker::{BreakerRegistry, BreakerSnapshot, ValkeyStore};
use relay_config::{Config, FailoverConfig, ProviderType};
use relay_identity::{ModelCatalog, Resolver};

use crate::EventStream;
use crate::chain::{ModelFilter, dedupe};
use crate::error::GatewayError;
use crate::provider::{Provider, single_shot_stream};
use crate::registry::ProviderRegistry;
use crate::types::{CompletionRequest, CompletionResponse};

/// Where and how a request was served
#[derive(Debug, Clone)]
pub struct RouteInfo {
    /// Provider that served the request
    pub provider: String,
    /// Native model id sent to the provider
    pub native_model: String,
    /// Time spent in the successful attempt
    pub elapsed: Duration,
}

/// A normalized reply together with its routing outcome
#[derive(Debug)]
pub struct RoutedResponse {
    /// Routing outcome for accounting and logging
    pub info: RouteInfo,
    /// The reply itself
    pub response: CompletionResponse,
}

/// The gateway runtime
pub struct Gateway {
    resolver: Resolver,
    providers: ProviderRegistry,
    breakers: Arc<BreakerRegistry>,
    failover: FailoverConfig,
    default_provider: Option<String>,
    filters: HashMap<String, ModelFilter>,
}

impl Gateway {
    /// Assemble a gateway from its parts
    pub fn new(
        resolver: Resolver,
        providers: ProviderRegistry,
        breakers: Arc<BreakerRegistry>,
        failover: FailoverConfig,
    ) -> Self {
        Self {
            resolver,
            providers,
            breakers,
            failover,
            default_provider: None,
            filters: HashMap::new(),
        }
    }

    /// Provider used when inference finds no match
    #[must_use]
    pub fn with_default_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = Some(provider.into());
        self
    }

    /// Attach a static model eligibility filter for a provider
    #[must_use]
    pub fn with_model_filter(mut self, provider: impl Into<String>, filter: ModelFilter) -> Self {
        self.filters.insert(provider.into(), filter);
        self
    }

    /// Build a gateway from configuration
    ///
    /// Constructs one adapter per configured provider; a provider that
    /// fails validation is skipped with an error log so the rest still
    /// come up. Seeds breaker state from the shared mirror when one is
    /// configured.
    pub async fn from_config(config: Config) -> Result<Self, GatewayError> {
        let resolver = match &config.resolver.catalog_path {
            Some(path) => Resolver::new(
                ModelCatalog::from_path(path)
                    .map_err(|e| GatewayError::Internal(anyhow::anyhow!("model catalog: {e}")))?,
            ),
            None => Resolver::embedded(),
        };

        let mut providers = ProviderRegistry::new(config.default_timeout);
        let mut filters = HashMap::new();

        for (name, provider_config) in &config.providers {
            let provider: Arc<dyn Provider> = match provider_config.provider_type {
                ProviderType::Openai => Arc::new(crate::provider::openai::OpenAiCompatProvider::new(
                    name.clone(),
                    provider_config,
                )),
                ProviderType::Anthropic => Arc::new(crate::provider::anthropic::AnthropicProvider::new(
                    name.clone(),
                    provider_config,
                )),
            };

            if let Err(e) = providers.register(
                name.clone(),
                provider,
                provider_config.timeout,
                provider_config.streaming,
            ) {
                tracing::error!(provider = %name, error = %e, "skipping provider registration");
                continue;
            }

            match ModelFilter::from_patterns(&provider_config.models) {
                Ok(filter) => {
                    filters.insert(name.clone(), filter);
                }
                Err(e) => {
                    tracing::error!(provider = %name, error = %e, "invalid model patterns, provider serves all models");
                }
            }
        }

        let breaker_config = config.circuit_breaker.clone();
        let breakers = match &config.mirror {
            Some(mirror) => match ValkeyStore::from_config(mirror) {
                Ok(store) => BreakerRegistry::with_store(breaker_config, Arc::new(store)),
                Err(e) => {
                    tracing::warn!(error = %e, "breaker mirror unavailable, using local state only");
                    BreakerRegistry::new(breaker_config)
                }
            },
            None => BreakerRegistry::new(breaker_config),
        };
        let breakers = Arc::new(breakers);
        breakers.hydrate(config.providers.keys()).await;

        let gateway = Self {
            resolver,
            providers,
            breakers,
            failover: config.failover,
            default_provider: config.resolver.default_provider,
            filters,
        };
        Ok(gateway)
    }

    /// Build the ordered candidate chain for a canonical model
    ///
    /// Explicit provider first (fallbacks appended only when policy
    /// allows); otherwise the inferred or default provider plus configured
    /// fallbacks. Statically ineligible, unregistered, and circuit-open
    /// providers are removed, preserving relative order throughout.
    pub fn build_chain(
        &self,
        canonical: &str,
        explicit_provider: Option<&str>,
    ) -> Result<Vec<String>, GatewayError> {
        let mut candidates: Vec<String> = Vec::new();

        if let Some(explicit) = explicit_provider {
            if !self.providers.contains(explicit) {
                return Err(GatewayError::UnknownProvider {
                    provider: explicit.to_owned(),
                });
            }
            candidates.push(explicit.to_owned());
            if self.failover.enabled && self.failover.explicit_provider_fallback {
                candidates.extend(self.failover.fallbacks_for(canonical).iter().cloned());
            }
        } else {
            let primary = self
                .resolver
                .infer_provider(canonical)
                .map(str::to_owned)
                .or_else(|| self.default_provider.clone());
            if let Some(primary) = primary {
                candidates.push(primary);
            }
            if self.failover.enabled {
                candidates.extend(self.failover.fallbacks_for(canonical).iter().cloned());
            }
        }

        let mut candidates = dedupe(candidates);
        candidates.truncate(self.failover.max_attempts);

        candidates.retain(|name| {
            if !self.providers.contains(name) {
                tracing::warn!(provider = %name, "dropping unregistered chain candidate");
                return false;
            }
            if let Some(filter) = self.filters.get(name)
                && !filter.allows(canonical)
            {
                tracing::debug!(provider = %name, model = %canonical, "provider does not serve model");
                return false;
            }
            true
        });

        if candidates.is_empty() {
            return Err(GatewayError::AllProvidersFailed {
                model: canonical.to_owned(),
                attempted: Vec::new(),
                last: Box::new(GatewayError::InvalidRequest(format!(
                    "no configured provider serves model '{canonical}'"
                ))),
            });
        }

        let eligible: Vec<String> = candidates
            .iter()
            .filter(|name| self.breakers.should_attempt(name))
            .cloned()
            .collect();

        if eligible.is_empty() {
            let blocked = &candidates[0];
            let snapshot = self.breakers.snapshot(blocked);
            return Err(GatewayError::AllProvidersFailed {
                model: canonical.to_owned(),
                attempted: candidates.clone(),
                last: Box::new(GatewayError::CircuitOpen {
                    provider: blocked.clone(),
                    retry_in: snapshot.seconds_until_retry,
                }),
            });
        }

        Ok(eligible)
    }

    /// Route a non-streaming completion through the failover chain
    pub async fn route(
        &self,
        request: CompletionRequest,
        explicit_provider: Option<&str>,
    ) -> Result<RoutedResponse, GatewayError> {
        let canonical = self.resolver.resolve_alias(&request.model);
        let chain = self.build_chain(&canonical, explicit_provider)?;

        let mut attempted: Vec<String> = Vec::new();
        let mut last_error: Option<GatewayError> = None;

        for (index, candidate) in chain.iter().enumerate() {
            // State may have moved since the chain was built; a breaker
            // that opened meanwhile is skipped without counting a failure
            if !self.breakers.should_attempt(candidate) {
                tracing::debug!(provider = %candidate, "skipping provider, circuit opened mid-chain");
                continue;
            }

            let native = self.resolver.transform(&canonical, candidate);
            let Some(profile) = self.providers.get(candidate) else {
                continue;
            };

            let mut attempt_request = request.clone();
            attempt_request.model.clone_from(&native);
            attempted.push(candidate.clone());

            let start = Instant::now();
            let outcome = tokio::time::timeout(profile.timeout, profile.provider.complete(&attempt_request))
                .await
                .unwrap_or_else(|_| {
                    Err(GatewayError::Timeout {
                        provider: candidate.clone(),
                        timeout: profile.timeout,
                    })
                });

            match outcome {
                Ok(response) => {
                    self.breakers.record_success(candidate);
                    let elapsed = start.elapsed();
                    tracing::info!(
                        provider = %candidate,
                        model = %native,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "request served"
                    );
                    return Ok(RoutedResponse {
                        info: RouteInfo {
                            provider: candidate.clone(),
                            native_model: native,
                            elapsed,
                        },
                        response,
                    });
                }
                Err(error) => {
                    self.breakers.record_failure(candidate);

                    let more_candidates = index + 1 < chain.len();
                    if !error.is_retryable() {
                        tracing::warn!(
                            provider = %candidate,
                            model = %native,
                            error = %error,
                            "non-retryable failure, aborting chain"
                        );
                        return Err(error);
                    }

                    if more_candidates {
                        tracing::warn!(
                            provider = %candidate,
                            model = %native,
                            error = %error,
                            "provider failed, advancing to next candidate"
                        );
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(GatewayError::AllProvidersFailed {
            model: canonical.clone(),
            attempted,
            last: Box::new(last_error.unwrap_or_else(|| {
                let blocked = &chain[0];
                GatewayError::CircuitOpen {
                    provider: blocked.clone(),
                    retry_in: self.breakers.snapshot(blocked).seconds_until_retry,
                }
            })),
        })
    }

    /// Route a streaming completion through the failover chain
    ///
    /// Failover is only possible before the stream is established; once
    /// chunks flow, a mid-stream error is reported to the caller and
    /// counted against the serving provider, but no retraction or retry
    /// happens. A provider without streaming support serves the request
    /// as a single-shot stream wrapped around its blocking reply.
    pub async fn route_stream(
        &self,
        request: CompletionRequest,
        explicit_provider: Option<&str>,
    ) -> Result<(RouteInfo, EventStream), GatewayError> {
        let canonical = self.resolver.resolve_alias(&request.model);
        let chain = self.build_chain(&canonical, explicit_provider)?;

        let mut attempted: Vec<String> = Vec::new();
        let mut last_error: Option<GatewayError> = None;

        for (index, candidate) in chain.iter().enumerate() {
            if !self.breakers.should_attempt(candidate) {
                continue;
            }

            let native = self.resolver.transform(&canonical, candidate);
            let Some(profile) = self.providers.get(candidate) else {
                continue;
            };

            let mut attempt_request = request.clone();
            attempt_request.model.clone_from(&native);
            attempted.push(candidate.clone());

            let streamable = profile.streaming && profile.provider.capabilities().streaming;
            let start = Instant::now();

            let outcome = if streamable {
                tokio::time::timeout(profile.timeout, profile.provider.complete_stream(&attempt_request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(GatewayError::Timeout {
                            provider: candidate.clone(),
                            timeout: profile.timeout,
                        })
                    })
            } else {
                tokio::time::timeout(profile.timeout, profile.provider.complete(&attempt_request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(GatewayError::Timeout {
                            provider: candidate.clone(),
                            timeout: profile.timeout,
                        })
                    })
                    .map(single_shot_stream)
            };

            match outcome {
                Ok(stream) => {
                    self.breakers.record_success(candidate);
                    let info = RouteInfo {
                        provider: candidate.clone(),
                        native_model: native,
                        elapsed: start.elapsed(),
                    };
                    tracing::info!(
                        provider = %candidate,
                        model = %info.native_model,
                        "stream established"
                    );
                    let monitored =
                        monitor_stream(stream, Arc::clone(&self.breakers), candidate.clone());
                    return Ok((info, monitored));
                }
                Err(error) => {
                    self.breakers.record_failure(candidate);

                    if !error.is_retryable() {
                        return Err(error);
                    }
                    if index + 1 < chain.len() {
                        tracing::warn!(
                            provider = %candidate,
                            error = %error,
                            "streaming dispatch failed, advancing to next candidate"
                        );
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(GatewayError::AllProvidersFailed {
            model: canonical.clone(),
            attempted,
            last: Box::new(last_error.unwrap_or_else(|| {
                let blocked = &chain[0];
                GatewayError::CircuitOpen {
                    provider: blocked.clone(),
                    retry_in: self.breakers.snapshot(blocked).seconds_until_retry,
                }
            })),
        })
    }

    /// Observable breaker state for a provider
    pub fn breaker_snapshot(&self, provider: &str) -> BreakerSnapshot {
        self.breakers.snapshot(provider)
    }

    /// Operational override: close one provider's breaker
    pub fn reset_breaker(&self, provider: &str) {
        self.breakers.reset(provider);
    }

    /// Operational override: close every breaker
    pub fn reset_all_breakers(&self) {
        self.breakers.reset_all();
    }

    /// The identity resolver in use
    pub const fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}

/// Count a mid-stream error against the serving provider, once
fn monitor_stream(stream: EventStream, breakers: Arc<BreakerRegistry>, provider: String) -> EventStream {
    let mut recorded = false;
    Box::pin(stream.map(move |item| {
        if item.is_err() && !recorded {
            recorded = true;
            breakers.record_failure(&provider);
            tracing::warn!(provider = %provider, "stream failed mid-flight");
        }
        item
    }))
}
