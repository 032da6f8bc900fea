//! Osprey Engine - concurrent source-query orchestration
//!
//! The core subsystem:
//! - [`ResultCache`]: time-boxed memoized results, lazy expiry
//! - [`RateLimiter`]: per-source request spacing
//! - [`RetryPolicy`]: bounded retry with linear backoff
//! - [`Flight`]: single-flight join for identical in-flight queries
//! - [`SourceQueryExecutor`]: one source query, never raises
//! - [`AggregationEngine`]: fan-out/fan-in across all eligible sources
//!
//! All state is owned by explicit instances, not ambient singletons, so
//! independent aggregation sessions never cross-contaminate.

pub mod aggregate;
pub mod cache;
pub mod executor;
pub mod export;
pub mod flight;
pub mod limiter;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::*;
pub use cache::*;
pub use executor::*;
pub use export::*;
pub use flight::*;
pub use limiter::*;
pub use retry::*;
