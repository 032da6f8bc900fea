//! Domain sources
//!
//! - `crtsh`: subdomain discovery from the crt.sh certificate
//!   transparency log
//! - `dns_records`: common record types over DNS-over-HTTPS

use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map};
use tracing::debug;

use osprey_core::{IntelData, Source};

use crate::{dns, HandlerError, SourceHandler};

const RECORD_TYPES: &[&str] = &["A", "AAAA", "MX", "NS", "TXT"];

pub struct DomainHandler {
    client: Client,
}

impl DomainHandler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn certificate_transparency(&self, domain: &str) -> Result<IntelData, HandlerError> {
        let url = format!(
            "https://crt.sh/?q={}&output=json",
            urlencoding::encode(&format!("%.{domain}"))
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(HandlerError::Status(response.status()));
        }

        let entries: Vec<CrtShEntry> = response
            .json()
            .await
            .map_err(|e| HandlerError::Decode(e.to_string()))?;

        let subdomains = extract_subdomains(&entries, domain);
        debug!("crt.sh: {} certs, {} subdomains for {}", entries.len(), subdomains.len(), domain);

        if subdomains.is_empty() {
            return Ok(IntelData::miss());
        }

        Ok(IntelData::hit(Map::new())
            .with("subdomains", json!(subdomains))
            .with("certificate_count", json!(entries.len())))
    }

    async fn dns_records(&self, domain: &str) -> Result<IntelData, HandlerError> {
        let mut fields = Map::new();
        let mut any = false;

        for record_type in RECORD_TYPES {
            let records = dns::resolve(&self.client, domain, record_type).await?;
            if !records.is_empty() {
                any = true;
                fields.insert(record_type.to_lowercase(), json!(records));
            }
        }

        if !any {
            return Ok(IntelData::miss());
        }
        Ok(IntelData::hit(fields))
    }
}

#[async_trait]
impl SourceHandler for DomainHandler {
    async fn lookup(&self, source: &Source, query: &str) -> Result<IntelData, HandlerError> {
        match source.id.as_str() {
            "crtsh" => self.certificate_transparency(query).await,
            "dns_records" => self.dns_records(query).await,
            other => Err(HandlerError::UnknownSource(other.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CrtShEntry {
    name_value: String,
}

/// Pull unique in-scope names out of crt.sh entries
///
/// `name_value` packs newline-separated SANs; wildcard prefixes are
/// stripped rather than discarded.
fn extract_subdomains(entries: &[CrtShEntry], domain: &str) -> Vec<String> {
    let suffix = format!(".{}", domain.to_ascii_lowercase());
    let mut names = BTreeSet::new();

    for entry in entries {
        for raw in entry.name_value.lines() {
            let name = raw.trim().trim_start_matches("*.").to_ascii_lowercase();
            if name == domain || name.ends_with(&suffix) {
                names.insert(name);
            }
        }
    }

    names.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_subdomains() {
        let entries = vec![
            CrtShEntry {
                name_value: "www.example.com\nmail.example.com".to_string(),
            },
            CrtShEntry {
                name_value: "*.dev.example.com".to_string(),
            },
            CrtShEntry {
                name_value: "WWW.EXAMPLE.COM".to_string(),
            },
            CrtShEntry {
                name_value: "evil.example.org".to_string(),
            },
        ];

        let subdomains = extract_subdomains(&entries, "example.com");
        assert_eq!(
            subdomains,
            vec!["dev.example.com", "mail.example.com", "www.example.com"]
        );
    }

    #[test]
    fn test_extract_subdomains_keeps_apex() {
        let entries = vec![CrtShEntry {
            name_value: "example.com".to_string(),
        }];
        assert_eq!(extract_subdomains(&entries, "example.com"), vec!["example.com"]);
    }

    #[tokio::test]
    async fn test_unknown_source_id() {
        let handler = DomainHandler::new(Client::new());
        let source = Source {
            id: "whois".to_string(),
            name: "Whois".to_string(),
            category: osprey_core::Category::Domain,
            confidence: 50,
            enabled: true,
            rate_limit_ms: 0,
            data_types: vec![],
            description: String::new(),
        };

        let err = handler.lookup(&source, "example.com").await.unwrap_err();
        assert!(matches!(err, HandlerError::UnknownSource(ref id) if id == "whois"));
    }
}
