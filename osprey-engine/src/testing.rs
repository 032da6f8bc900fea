//! Test doubles shared by the engine's test modules

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map};
use tokio::time::Instant;

use osprey_core::{Category, IntelData, ResultEnvelope, Source};
use osprey_sources::{HandlerError, SourceHandler};

pub(crate) fn test_source(id: &str, category: Category, rate_limit_ms: u64) -> Source {
    Source {
        id: id.to_string(),
        name: id.to_string(),
        category,
        confidence: 80,
        enabled: true,
        rate_limit_ms,
        data_types: vec![],
        description: String::new(),
    }
}

pub(crate) fn hit_envelope(source: &Source, query: &str) -> ResultEnvelope {
    ResultEnvelope::fulfilled(
        source,
        query,
        IntelData::hit(Map::new()).with("marker", json!(query)),
    )
}

/// Scripted handler with invocation accounting
pub(crate) struct MockHandler {
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    failures_before_success: usize,
    failing_sources: Vec<String>,
    delay: Duration,
}

impl MockHandler {
    pub(crate) fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            failures_before_success: 0,
            failing_sources: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    /// Fail the first `n` invocations, succeed afterwards
    pub(crate) fn failing_first(n: usize) -> Self {
        Self {
            failures_before_success: n,
            ..Self::new()
        }
    }

    /// Always fail lookups for the given source id
    pub(crate) fn failing_source(id: &str) -> Self {
        Self {
            failing_sources: vec![id.to_string()],
            ..Self::new()
        }
    }

    /// Hold every lookup for `delay` before answering
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceHandler for MockHandler {
    async fn lookup(&self, source: &Source, query: &str) -> Result<IntelData, HandlerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing_sources.contains(&source.id) {
            return Err(HandlerError::Decode(format!(
                "scripted failure for {}",
                source.id
            )));
        }
        if n < self.failures_before_success {
            return Err(HandlerError::Decode(format!("scripted failure {n}")));
        }

        Ok(IntelData::hit(Map::new())
            .with("query", json!(query))
            .with("source", json!(source.id)))
    }
}
