//! Fan-out/fan-in aggregation
//!
//! One query enters, one consolidated report leaves. Every eligible
//! source is dispatched concurrently; no individual failure aborts the
//! batch, and a run with zero eligible sources produces an empty report
//! rather than an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use osprey_core::{AggregatedReport, Category, ResultEnvelope, SourceCatalog};
use osprey_sources::HandlerRegistry;

use crate::SourceQueryExecutor;

/// Runs aggregation sessions against one catalog
///
/// Owns its executor (and through it the cache, limiter, and flight
/// table), so independent engines never share state.
pub struct AggregationEngine {
    catalog: Arc<SourceCatalog>,
    executor: Arc<SourceQueryExecutor>,
    generation: AtomicU64,
}

impl AggregationEngine {
    pub fn new(catalog: Arc<SourceCatalog>, handlers: HandlerRegistry) -> Self {
        Self {
            executor: Arc::new(SourceQueryExecutor::new(catalog.clone(), handlers)),
            catalog,
            generation: AtomicU64::new(0),
        }
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn executor(&self) -> &SourceQueryExecutor {
        &self.executor
    }

    /// Generation stamped on the most recent run, 0 before any run
    ///
    /// In-flight queries are never cancelled when a new query supersedes
    /// them; consumers compare a report's generation against this to
    /// discard stale results.
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Boundary normalization applied to every run's target
    ///
    /// Domains, emails, and IPs are case-insensitive identifiers, so
    /// they are trimmed and lowercased before querying (and therefore
    /// before caching). Usernames keep their case: some platforms treat
    /// it as significant.
    pub fn normalize_target(target: &str, category: Category) -> String {
        let trimmed = target.trim();
        match category {
            Category::Username => trimmed.to_string(),
            Category::Email | Category::Domain | Category::Ip => trimmed.to_ascii_lowercase(),
        }
    }

    /// Query every eligible source and consolidate the outcomes
    pub async fn run(&self, target: &str, category: Category) -> AggregatedReport {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let target = Self::normalize_target(target, category);
        let sources = self.catalog.sources_for(category);

        if sources.is_empty() {
            info!("No sources available for category {}", category);
            return AggregatedReport::empty(&target, category, generation);
        }

        let settings = self.catalog.settings();
        let stagger = Duration::from_millis(settings.stagger_ms);
        let max_concurrent = settings.max_concurrent_requests.max(1);

        info!(
            "Aggregating {} across {} {} sources",
            target,
            sources.len(),
            category
        );

        let envelopes: Vec<ResultEnvelope> = stream::iter(sources.iter().cloned().enumerate())
            .map(|(index, source)| {
                let executor = self.executor.clone();
                let target = target.clone();
                async move {
                    // Spread dispatch starts to smooth burst load on
                    // shared upstream endpoints.
                    if !stagger.is_zero() && index > 0 {
                        tokio::time::sleep(stagger * index as u32).await;
                    }
                    debug!("Dispatching {} for {}", source.id, target);
                    executor.query(&source, &target).await
                }
            })
            .buffer_unordered(max_concurrent)
            .collect()
            .await;

        let report = AggregatedReport::from_envelopes(&target, category, generation, envelopes);
        info!(
            "Run {} complete: {}/{} sources succeeded, data_found={}",
            generation,
            report.summary.successful_sources,
            report.summary.total_sources,
            report.summary.data_found
        );
        report
    }

    /// Detect the category, then run
    pub async fn run_detected(&self, target: &str) -> AggregatedReport {
        self.run(target, Category::detect(target)).await
    }
}
