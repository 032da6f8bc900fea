//! Single-source query execution
//!
//! One envelope per call, success or not — no error from a source's
//! lookup escapes this boundary. The sequence per query:
//! cache lookup, single-flight join, then (as leader) rate limit, handler
//! dispatch under retry and a timeout, cache store, publish.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use osprey_core::{ResultEnvelope, Source, SourceCatalog};
use osprey_sources::{HandlerError, HandlerRegistry};

use crate::{await_leader, Flight, FlightRole, RateLimiter, ResultCache, RetryPolicy};

/// Errors raised to the immediate caller (never from `query` itself)
#[derive(Debug, Error)]
pub enum EngineError {
    /// A source id the catalog does not know — a configuration or
    /// programming error, not a transient condition
    #[error("unknown source id: {0}")]
    UnknownSource(String),
}

/// Executes one source query through cache, limiter, retry, and handler
pub struct SourceQueryExecutor {
    catalog: Arc<SourceCatalog>,
    handlers: HandlerRegistry,
    cache: ResultCache,
    limiter: RateLimiter,
    retry: RetryPolicy,
    flight: Flight,
    timeout: Duration,
}

impl SourceQueryExecutor {
    /// Build an executor owning fresh cache/limiter/flight state
    ///
    /// Retry and timeout parameters come from the catalog's settings
    /// block.
    pub fn new(catalog: Arc<SourceCatalog>, handlers: HandlerRegistry) -> Self {
        let settings = catalog.settings();
        Self {
            handlers,
            cache: ResultCache::new(),
            limiter: RateLimiter::new(),
            retry: RetryPolicy::new(
                settings.retry_attempts,
                Duration::from_millis(settings.backoff_base_ms),
            ),
            flight: Flight::new(),
            timeout: Duration::from_secs(settings.default_timeout_secs),
            catalog,
        }
    }

    /// The session cache, for export and inspection
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Query one source, always producing an envelope
    ///
    /// A cache hit returns immediately, bypassing the rate limiter and
    /// the handler entirely. Otherwise concurrent callers for the same
    /// source/query pair share a single flight: one runs the lookup,
    /// the rest await its envelope.
    pub async fn query(&self, source: &Source, target: &str) -> ResultEnvelope {
        if let Some(cached) = self.cache.get(&source.id, target) {
            debug!("Cache hit: {}:{}", source.id, target);
            return cached;
        }

        let key = ResultCache::key(&source.id, target);
        loop {
            match self.flight.join(&key) {
                FlightRole::Leader(mut guard) => {
                    let envelope = self.fetch(source, target).await;
                    self.cache.put(&source.id, target, envelope.clone());
                    guard.publish(&envelope);
                    return envelope;
                }
                FlightRole::Follower(rx) => {
                    debug!("Joining in-flight query {}", key);
                    match await_leader(rx).await {
                        Some(envelope) => return envelope,
                        // Leader vanished without publishing; take over
                        // (or pick up whatever it managed to cache).
                        None => {
                            if let Some(cached) = self.cache.get(&source.id, target) {
                                return cached;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Query a source by catalog id
    pub async fn query_by_id(
        &self,
        id: &str,
        target: &str,
    ) -> Result<ResultEnvelope, EngineError> {
        let source = self
            .catalog
            .find(id)
            .ok_or_else(|| EngineError::UnknownSource(id.to_string()))?;
        Ok(self.query(source, target).await)
    }

    /// Rate-limited, retried, time-boxed handler dispatch
    ///
    /// The limiter runs inside the retry loop: every attempt is a real
    /// request to the source, so each one honors the spacing.
    async fn fetch(&self, source: &Source, target: &str) -> ResultEnvelope {
        let handler = self.handlers.handler(source.category);
        let min_interval = Duration::from_millis(source.rate_limit_ms);

        let outcome = self
            .retry
            .execute(|| async move {
                self.limiter.before_request(&source.id, min_interval).await;
                match tokio::time::timeout(self.timeout, handler.lookup(source, target)).await {
                    Ok(result) => result,
                    Err(_) => Err(HandlerError::Timeout(self.timeout.as_secs())),
                }
            })
            .await;

        match outcome {
            Ok(data) => {
                debug!("Source {} answered for {}", source.id, target);
                ResultEnvelope::fulfilled(source, target, data)
            }
            Err(e) => {
                warn!("Source {} failed for {}: {}", source.id, target, e);
                ResultEnvelope::failed(source, target, e.to_string())
            }
        }
    }
}
