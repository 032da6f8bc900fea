//! Session cache export
//!
//! Serializes everything the session has learned (the live cache
//! contents) to delimited or structured text for downstream tooling.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

use crate::ResultCache;

/// Supported export forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown export format: {0}")]
pub struct UnknownFormat(String);

impl FromStr for ExportFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

/// Serialize the live cache contents
pub fn export_intelligence(cache: &ResultCache, format: ExportFormat) -> String {
    let snapshot = cache.snapshot();

    match format {
        ExportFormat::Json => serde_json::to_string_pretty(&snapshot).unwrap_or_else(|e| {
            warn!("Export serialization failed: {}", e);
            String::from("[]")
        }),
        ExportFormat::Csv => {
            let mut out =
                String::from("source_id,category,query,success,found,confidence,timestamp,error\n");
            for envelope in snapshot {
                let row = [
                    csv_field(&envelope.source_id),
                    csv_field(envelope.category.as_str()),
                    csv_field(&envelope.query),
                    envelope.success.to_string(),
                    envelope.data.found.to_string(),
                    envelope.confidence.to_string(),
                    envelope.timestamp.to_rfc3339(),
                    csv_field(envelope.data.error.as_deref().unwrap_or("")),
                ];
                out.push_str(&row.join(","));
                out.push('\n');
            }
            out
        }
    }
}

/// Quote a field when it would break the row
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hit_envelope, test_source};
    use osprey_core::{Category, ResultEnvelope};

    fn populated_cache() -> ResultCache {
        let cache = ResultCache::new();
        let crtsh = test_source("crtsh", Category::Domain, 0);
        let geo = test_source("geolocation", Category::Ip, 0);

        cache.put(&crtsh.id, "example.com", hit_envelope(&crtsh, "example.com"));
        cache.put(
            &geo.id,
            "8.8.8.8",
            ResultEnvelope::failed(&geo, "8.8.8.8", "timeout, gave up"),
        );
        cache
    }

    #[tokio::test]
    async fn test_csv_export() {
        let csv = export_intelligence(&populated_cache(), ExportFormat::Csv);
        let lines: Vec<&str> = csv.trim_end().lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("source_id,category,query"));
        // snapshot is key-ordered: crtsh row before geolocation row
        assert!(lines[1].starts_with("crtsh,domain,example.com,true,true"));
        assert!(lines[2].starts_with("geolocation,ip,8.8.8.8,false,false"));
        // the comma in the error message is quoted
        assert!(lines[2].ends_with("\"timeout, gave up\""));
    }

    #[tokio::test]
    async fn test_json_export_round_trips() {
        let json = export_intelligence(&populated_cache(), ExportFormat::Json);
        let parsed: Vec<ResultEnvelope> = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].source_id, "crtsh");
        assert!(!parsed[1].success);
    }

    #[tokio::test]
    async fn test_empty_cache_exports_header_only() {
        let cache = ResultCache::new();
        let csv = export_intelligence(&cache, ExportFormat::Csv);
        assert_eq!(csv.lines().count(), 1);
        assert_eq!(export_intelligence(&cache, ExportFormat::Json).trim(), "[]");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
