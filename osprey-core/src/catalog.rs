//! Declarative source catalog
//!
//! Loads the catalog of available sources from a TOML document, grouped by
//! query-type category, plus a settings block shared by the aggregation
//! engine. Read-only after load.
//!
//! The strict loaders reject malformed documents and unknown category
//! keys. The lenient loaders substitute an empty-but-valid catalog (all
//! categories present, zero sources) so callers never observe an
//! uninitialized state, only a degraded one.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{Category, Source, DEFAULT_RATE_LIMIT_MS, MAX_CONFIDENCE};

/// Default catalog shipped with the binary
const EMBEDDED_CATALOG: &str = include_str!("../catalog/sources.toml");

/// Errors from strict catalog loading
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown category in catalog: {0}")]
    UnknownCategory(String),

    #[error("duplicate source id: {0}")]
    DuplicateSource(String),

    #[error("invalid source {id}: {reason}")]
    InvalidSource { id: String, reason: String },
}

/// Engine settings from the catalog's `[settings]` block
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    /// Fan-out width for one aggregation run
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Per-request timeout applied around handler dispatch
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Attempts per source query, including the first
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Linear backoff base between attempts
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Dispatch stagger per source index, 0 disables
    #[serde(default)]
    pub stagger_ms: u64,
}

fn default_max_concurrent() -> usize {
    8
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            default_timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            stagger_ms: 0,
        }
    }
}

// Document shape: sources in the file do not repeat their category, it is
// taken from the `[categories.<name>]` table they sit under.

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    settings: CatalogSettings,
    #[serde(default)]
    categories: HashMap<String, CategoryEntry>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    #[serde(default)]
    sources: Vec<SourceEntry>,
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    id: String,
    name: String,
    confidence: u8,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default = "default_rate_limit_ms")]
    rate_limit_ms: u64,
    #[serde(default)]
    data_types: Vec<String>,
    #[serde(default)]
    description: String,
}

fn default_enabled() -> bool {
    true
}

fn default_rate_limit_ms() -> u64 {
    DEFAULT_RATE_LIMIT_MS
}

/// The loaded, read-only source catalog
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    by_category: HashMap<Category, Vec<Source>>,
    settings: CatalogSettings,
}

impl SourceCatalog {
    /// Parse a catalog document, failing fast on structural problems
    ///
    /// Unknown category keys are a load error: a typo in the document
    /// should surface at startup, not silently drop a source group.
    pub fn from_toml_str(doc: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = toml::from_str(doc)?;

        let mut by_category: HashMap<Category, Vec<Source>> = Category::ALL
            .iter()
            .map(|c| (*c, Vec::new()))
            .collect();
        let mut seen_ids: Vec<String> = Vec::new();

        for (key, group) in document.categories {
            let category = Category::from_str(&key)
                .map_err(|_| CatalogError::UnknownCategory(key.clone()))?;

            for source in group.sources {
                if source.id.is_empty() {
                    return Err(CatalogError::InvalidSource {
                        id: source.name.clone(),
                        reason: "empty id".to_string(),
                    });
                }
                if source.confidence > MAX_CONFIDENCE {
                    return Err(CatalogError::InvalidSource {
                        id: source.id.clone(),
                        reason: format!("confidence {} exceeds 100", source.confidence),
                    });
                }
                if seen_ids.contains(&source.id) {
                    return Err(CatalogError::DuplicateSource(source.id));
                }
                seen_ids.push(source.id.clone());

                if !source.enabled {
                    debug!("Source {} disabled in catalog, skipping", source.id);
                    continue;
                }

                by_category.entry(category).or_default().push(Source {
                    id: source.id,
                    name: source.name,
                    category,
                    confidence: source.confidence,
                    enabled: source.enabled,
                    rate_limit_ms: source.rate_limit_ms,
                    data_types: source.data_types,
                    description: source.description,
                });
            }
        }

        Ok(Self {
            by_category,
            settings: document.settings,
        })
    }

    /// Strictly load a catalog file
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load a catalog file, or the appropriate fallback
    ///
    /// With no path, the embedded default catalog is used. Any load
    /// failure degrades to the empty catalog with a warning.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match Self::load_from_path(path) {
                Ok(catalog) => catalog,
                Err(e) => {
                    warn!("Catalog load failed ({}), running with empty catalog", e);
                    Self::empty()
                }
            },
            None => Self::embedded(),
        }
    }

    /// The catalog compiled into the binary
    pub fn embedded() -> Self {
        match Self::from_toml_str(EMBEDDED_CATALOG) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Embedded catalog invalid ({}), running with empty catalog", e);
                Self::empty()
            }
        }
    }

    /// A valid catalog with every category present and zero sources
    pub fn empty() -> Self {
        Self {
            by_category: Category::ALL.iter().map(|c| (*c, Vec::new())).collect(),
            settings: CatalogSettings::default(),
        }
    }

    /// Enabled sources for one category, in document order
    pub fn sources_for(&self, category: Category) -> &[Source] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Enabled sources across all categories
    pub fn all_sources(&self) -> Vec<&Source> {
        Category::ALL
            .iter()
            .flat_map(|c| self.sources_for(*c))
            .collect()
    }

    /// Look up one source by id
    pub fn find(&self, id: &str) -> Option<&Source> {
        self.by_category
            .values()
            .flat_map(|sources| sources.iter())
            .find(|s| s.id == id)
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    /// Total enabled source count
    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [settings]
        max_concurrent_requests = 4
        stagger_ms = 25

        [categories.domain]
        sources = [
            { id = "crtsh", name = "Certificate Transparency", confidence = 90, rate_limit_ms = 2000 },
            { id = "dns_records", name = "DNS Records", confidence = 95 },
            { id = "wayback", name = "Wayback Machine", confidence = 50, enabled = false },
        ]

        [categories.ip]
        sources = [
            { id = "geolocation", name = "IP Geolocation", confidence = 85 },
        ]
    "#;

    #[test]
    fn test_parse_sample() {
        let catalog = SourceCatalog::from_toml_str(SAMPLE).unwrap();

        assert_eq!(catalog.settings().max_concurrent_requests, 4);
        assert_eq!(catalog.settings().stagger_ms, 25);
        // retry settings fall back to defaults
        assert_eq!(catalog.settings().retry_attempts, 3);

        let domain = catalog.sources_for(Category::Domain);
        assert_eq!(domain.len(), 2, "disabled sources are dropped at load");
        assert_eq!(domain[0].id, "crtsh");
        assert_eq!(domain[0].rate_limit_ms, 2000);
        assert_eq!(domain[1].rate_limit_ms, DEFAULT_RATE_LIMIT_MS);

        assert!(catalog.find("geolocation").is_some());
        assert!(catalog.find("wayback").is_none());
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_unknown_category_fails_fast() {
        let doc = r#"
            [categories.webpage]
            sources = [ { id = "x", name = "X", confidence = 10 } ]
        "#;
        let err = SourceCatalog::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownCategory(ref k) if k == "webpage"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let doc = r#"
            [categories.domain]
            sources = [
                { id = "crtsh", name = "A", confidence = 10 },
            ]
            [categories.ip]
            sources = [
                { id = "crtsh", name = "B", confidence = 10 },
            ]
        "#;
        let err = SourceCatalog::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateSource(_)));
    }

    #[test]
    fn test_confidence_bounds() {
        let doc = r#"
            [categories.domain]
            sources = [ { id = "x", name = "X", confidence = 101 } ]
        "#;
        assert!(matches!(
            SourceCatalog::from_toml_str(doc).unwrap_err(),
            CatalogError::InvalidSource { .. }
        ));
    }

    #[test]
    fn test_empty_catalog_is_valid() {
        let catalog = SourceCatalog::empty();
        assert!(catalog.is_empty());
        for category in Category::ALL {
            assert!(catalog.sources_for(category).is_empty());
        }
        assert!(catalog.all_sources().is_empty());
    }

    #[test]
    fn test_malformed_document_falls_back_empty() {
        let catalog = SourceCatalog::load_or_default(Some(Path::new("/nonexistent/catalog.toml")));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_embedded_catalog_loads() {
        let catalog = SourceCatalog::embedded();
        assert!(!catalog.is_empty());
        for category in Category::ALL {
            assert!(
                !catalog.sources_for(category).is_empty(),
                "embedded catalog should cover {category}"
            );
        }
    }
}
