//! DNS-over-HTTPS helper
//!
//! Wraps the Cloudflare JSON resolver, shared by the domain, ip, and email
//! handlers.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::HandlerError;

const DOH_ENDPOINT: &str = "https://cloudflare-dns.com/dns-query";

#[derive(Debug, Deserialize)]
pub struct DnsResponse {
    #[serde(rename = "Status")]
    pub status: u32,
    #[serde(rename = "Answer", default)]
    pub answers: Vec<DnsAnswer>,
}

#[derive(Debug, Deserialize)]
pub struct DnsAnswer {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: u16,
    #[serde(rename = "TTL")]
    pub ttl: u32,
    pub data: String,
}

/// Resolve one record type for a name
///
/// NXDOMAIN and other non-zero rcodes come back as an empty answer list;
/// only transport and decode problems are errors.
pub async fn resolve(
    client: &Client,
    name: &str,
    record_type: &str,
) -> Result<Vec<String>, HandlerError> {
    let url = format!(
        "{}?name={}&type={}",
        DOH_ENDPOINT,
        urlencoding::encode(name),
        record_type
    );

    let response = client
        .get(&url)
        .header("Accept", "application/dns-json")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(HandlerError::Status(response.status()));
    }

    let parsed: DnsResponse = response
        .json()
        .await
        .map_err(|e| HandlerError::Decode(e.to_string()))?;

    if parsed.status != 0 {
        debug!("DNS {} {} rcode {}", record_type, name, parsed.status);
        return Ok(Vec::new());
    }

    Ok(parsed.answers.into_iter().map(|a| a.data).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dns_response() {
        let json = r#"{
            "Status": 0,
            "Answer": [
                { "name": "example.com", "type": 1, "TTL": 300, "data": "93.184.216.34" },
                { "name": "example.com", "type": 1, "TTL": 300, "data": "93.184.216.35" }
            ]
        }"#;

        let parsed: DnsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, 0);
        assert_eq!(parsed.answers.len(), 2);
        assert_eq!(parsed.answers[0].data, "93.184.216.34");
    }

    #[test]
    fn test_parse_nxdomain_without_answers() {
        let parsed: DnsResponse = serde_json::from_str(r#"{ "Status": 3 }"#).unwrap();
        assert_eq!(parsed.status, 3);
        assert!(parsed.answers.is_empty());
    }
}
