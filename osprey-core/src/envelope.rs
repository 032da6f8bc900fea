//! Result envelopes and aggregated reports
//!
//! Every source query produces exactly one [`ResultEnvelope`], success or
//! not. An aggregation run collects envelopes from all eligible sources and
//! folds them into one [`AggregatedReport`] whose summary counts always
//! partition the envelope list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Category, Source};

/// Opaque intelligence payload returned by a source handler
///
/// The core only interprets `found` and `error`; everything else is
/// category-specific and passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelData {
    /// Whether the source had anything on the target
    pub found: bool,

    /// Human-readable failure description, set on failed envelopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Category-specific fields, opaque to the core
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl IntelData {
    /// A positive result carrying supporting fields
    pub fn hit(fields: Map<String, Value>) -> Self {
        Self {
            found: true,
            error: None,
            fields,
        }
    }

    /// A clean "nothing known about this target" result
    pub fn miss() -> Self {
        Self {
            found: false,
            error: None,
            fields: Map::new(),
        }
    }

    /// A failed lookup
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            found: false,
            error: Some(error.into()),
            fields: Map::new(),
        }
    }

    /// Attach one extra field
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}

/// Outcome of validating an intelligence payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validity {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Validity {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn rejected(reason: &str) -> Self {
        Self {
            valid: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Check an intelligence payload before rendering it
///
/// Usable by any report consumer. A payload is rejected when its shape is
/// internally inconsistent, not merely empty: a miss with no fields is
/// valid, a hit with no supporting fields is not.
pub fn validate_intelligence(data: &IntelData) -> Validity {
    if data.found && data.error.is_some() {
        return Validity::rejected("positive result carries an error message");
    }
    if data.found && data.fields.is_empty() {
        return Validity::rejected("positive result has no supporting fields");
    }
    if data.fields.values().any(|v| v.is_null()) {
        return Validity::rejected("payload contains null fields");
    }
    Validity::ok()
}

/// Normalized result of one source query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub source_id: String,
    pub query: String,
    pub category: Category,
    pub confidence: u8,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub data: IntelData,
}

impl ResultEnvelope {
    /// Envelope for a completed lookup (found or not)
    pub fn fulfilled(source: &Source, query: &str, data: IntelData) -> Self {
        Self {
            source_id: source.id.clone(),
            query: query.to_string(),
            category: source.category,
            confidence: source.confidence,
            timestamp: Utc::now(),
            success: true,
            data,
        }
    }

    /// Envelope for a lookup that failed after all retries
    pub fn failed(source: &Source, query: &str, error: impl Into<String>) -> Self {
        Self {
            source_id: source.id.clone(),
            query: query.to_string(),
            category: source.category,
            confidence: source.confidence,
            timestamp: Utc::now(),
            success: false,
            data: IntelData::failed(error),
        }
    }
}

/// Summary statistics over one report's envelopes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_sources: usize,
    pub successful_sources: usize,
    pub failed_sources: usize,
    pub data_found: bool,
}

/// Consolidated outcome of one aggregation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub query: String,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    /// Monotonic run counter; consumers drop reports older than the
    /// latest query they issued
    pub generation: u64,
    pub sources: Vec<ResultEnvelope>,
    pub summary: ReportSummary,
}

impl AggregatedReport {
    /// Build a report from collected envelopes
    ///
    /// The only constructor, so the summary always partitions `sources`
    /// and `data_found` reflects the envelopes regardless of arrival
    /// order.
    pub fn from_envelopes(
        query: &str,
        category: Category,
        generation: u64,
        sources: Vec<ResultEnvelope>,
    ) -> Self {
        let successful = sources.iter().filter(|e| e.success).count();
        let data_found = sources.iter().any(|e| e.success && e.data.found);

        Self {
            query: query.to_string(),
            category,
            timestamp: Utc::now(),
            generation,
            summary: ReportSummary {
                total_sources: sources.len(),
                successful_sources: successful,
                failed_sources: sources.len() - successful,
                data_found,
            },
            sources,
        }
    }

    /// Report for a query with no eligible sources
    pub fn empty(query: &str, category: Category, generation: u64) -> Self {
        Self::from_envelopes(query, category, generation, Vec::new())
    }

    /// True when no sources were eligible for the query
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
