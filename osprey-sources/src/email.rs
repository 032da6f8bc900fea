//! Email sources
//!
//! - `gravatar`: avatar existence probe against the hashed address
//! - `mx_validation`: MX records of the mail domain over DNS-over-HTTPS
//! - `username_derivation`: offline candidate usernames from the local
//!   part

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map};
use sha2::{Digest, Sha256};

use osprey_core::{IntelData, Source};

use crate::{dns, HandlerError, SourceHandler};

pub struct EmailHandler {
    client: Client,
}

impl EmailHandler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn gravatar(&self, email: &str) -> Result<IntelData, HandlerError> {
        let hash = gravatar_hash(email);
        let url = format!("https://gravatar.com/avatar/{hash}?d=404");

        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(IntelData::miss());
        }
        if !response.status().is_success() {
            return Err(HandlerError::Status(response.status()));
        }

        Ok(IntelData::hit(Map::new())
            .with("avatar_url", json!(url))
            .with("hash", json!(hash)))
    }

    async fn mx_validation(&self, email: &str) -> Result<IntelData, HandlerError> {
        let domain = mail_domain(email)
            .ok_or_else(|| HandlerError::Decode(format!("not an email address: {email}")))?;

        let mx_records = dns::resolve(&self.client, domain, "MX").await?;

        if mx_records.is_empty() {
            return Ok(IntelData::miss().with("has_mx", json!(false)));
        }

        // MX data is "<preference> <exchange>"; keep the exchange hosts
        let hosts: Vec<String> = mx_records
            .iter()
            .filter_map(|r| r.split_whitespace().nth(1))
            .map(|h| h.trim_end_matches('.').to_string())
            .collect();

        Ok(IntelData::hit(Map::new())
            .with("has_mx", json!(true))
            .with("mx_hosts", json!(hosts)))
    }

    fn username_derivation(&self, email: &str) -> Result<IntelData, HandlerError> {
        let local = email
            .split('@')
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| HandlerError::Decode(format!("not an email address: {email}")))?;

        let candidates = derive_usernames(local);
        Ok(IntelData::hit(Map::new())
            .with("usernames", json!(candidates))
            .with("local_part", json!(local)))
    }
}

#[async_trait]
impl SourceHandler for EmailHandler {
    async fn lookup(&self, source: &Source, query: &str) -> Result<IntelData, HandlerError> {
        match source.id.as_str() {
            "gravatar" => self.gravatar(query).await,
            "mx_validation" => self.mx_validation(query).await,
            "username_derivation" => self.username_derivation(query),
            other => Err(HandlerError::UnknownSource(other.to_string())),
        }
    }
}

/// Gravatar identifies addresses by the SHA-256 of the trimmed,
/// lowercased form
fn gravatar_hash(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_ascii_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn mail_domain(email: &str) -> Option<&str> {
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(domain)
}

/// Candidate handles someone with this local part might use elsewhere
fn derive_usernames(local: &str) -> Vec<String> {
    let plain: String = local
        .chars()
        .take_while(|c| *c != '+')
        .collect::<String>()
        .to_ascii_lowercase();

    let mut candidates: Vec<String> = Vec::new();
    let mut push = |candidate: String| {
        if !candidate.is_empty() && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    };

    push(plain.clone());
    push(plain.chars().filter(|c| *c != '.' && *c != '_').collect());

    // first.last style: keep the parts and an initial+last form
    let parts: Vec<&str> = plain.split(['.', '_']).filter(|p| !p.is_empty()).collect();
    if parts.len() == 2 {
        push(parts[0].to_string());
        push(parts[1].to_string());
        if let Some(initial) = parts[0].chars().next() {
            push(format!("{initial}{}", parts[1]));
        }
    }

    candidates
}
