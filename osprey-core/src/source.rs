//! Target categories and source descriptors
//!
//! A [`Source`] is one independent intelligence-gathering endpoint with its
//! own confidence weighting and rate-limit hint. Sources are created at
//! catalog load and never mutated.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Query-type categories a source can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Email,
    Domain,
    Ip,
    Username,
}

impl Category {
    /// All categories, in catalog order
    pub const ALL: [Category; 4] = [
        Category::Email,
        Category::Domain,
        Category::Ip,
        Category::Username,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Email => "email",
            Category::Domain => "domain",
            Category::Ip => "ip",
            Category::Username => "username",
        }
    }

    /// Guess the category from the shape of a target string
    ///
    /// Order matters: an email also matches the domain pattern, and an IP
    /// literal would otherwise look like a bare hostname. Anything that
    /// matches nothing is treated as a username.
    pub fn detect(target: &str) -> Category {
        let target = target.trim();

        if EMAIL_RE.is_match(target) {
            return Category::Email;
        }
        if IpAddr::from_str(target).is_ok() {
            return Category::Ip;
        }
        if DOMAIN_RE.is_match(target) {
            return Category::Domain;
        }
        Category::Username
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for category strings outside the closed set
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Category::Email),
            "domain" => Ok(Category::Domain),
            "ip" => Ok(Category::Ip),
            "username" => Ok(Category::Username),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap()
});

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)([a-z0-9]([a-z0-9\-]*[a-z0-9])?\.)+[a-z]{2,}$").unwrap()
});

/// One intelligence source from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Unique key, stable across catalog reloads
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Which query type this source serves
    pub category: Category,
    /// Confidence weight (0-100)
    pub confidence: u8,
    /// Whether the source participates in aggregation
    pub enabled: bool,
    /// Minimum spacing between requests to this source
    pub rate_limit_ms: u64,
    /// Kinds of data the source can return
    pub data_types: Vec<String>,
    /// Short description for catalog listings
    pub description: String,
}
