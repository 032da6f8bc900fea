//! Osprey Core - domain model and source catalog for OSINT aggregation
//!
//! This crate provides the foundational primitives:
//! - Target categories (email/domain/ip/username) with shape detection
//! - Source descriptors and the declarative source catalog
//! - Result envelopes and the aggregated report structure
//! - Intelligence payload validation

pub mod catalog;
pub mod envelope;
pub mod source;

pub use catalog::*;
pub use envelope::*;
pub use source::*;

/// Cached results stay valid for this long
pub const CACHE_TTL_SECS: u64 = 3600;

/// Request spacing applied when a source declares none
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// Upper bound of the source confidence scale
pub const MAX_CONFIDENCE: u8 = 100;
