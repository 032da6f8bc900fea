//! IP sources
//!
//! - `geolocation`: country/city/network ownership from ip-api.com
//! - `reverse_dns`: PTR lookup over DNS-over-HTTPS

use std::net::IpAddr;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map};

use osprey_core::{IntelData, Source};

use crate::{dns, HandlerError, SourceHandler};

pub struct IpHandler {
    client: Client,
}

impl IpHandler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn geolocation(&self, ip: &str) -> Result<IntelData, HandlerError> {
        let url = format!(
            "http://ip-api.com/json/{}?fields=status,message,country,regionName,city,isp,org,as,lat,lon",
            urlencoding::encode(ip)
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(HandlerError::Status(response.status()));
        }

        let geo: IpApiResponse = response
            .json()
            .await
            .map_err(|e| HandlerError::Decode(e.to_string()))?;

        // ip-api reports reserved/private ranges as "fail"; that is a
        // clean miss, not a lookup failure
        if geo.status != "success" {
            return Ok(IntelData::miss()
                .with("reason", json!(geo.message.unwrap_or_else(|| "no data".to_string()))));
        }

        let mut fields = Map::new();
        for (key, value) in [
            ("country", geo.country),
            ("region", geo.region_name),
            ("city", geo.city),
            ("isp", geo.isp),
            ("org", geo.org),
            ("asn", geo.asn),
        ] {
            if let Some(value) = value {
                fields.insert(key.to_string(), json!(value));
            }
        }
        if let (Some(lat), Some(lon)) = (geo.lat, geo.lon) {
            fields.insert("coordinates".to_string(), json!([lat, lon]));
        }

        Ok(IntelData::hit(fields))
    }

    async fn reverse_dns(&self, ip: &str) -> Result<IntelData, HandlerError> {
        let addr = IpAddr::from_str(ip.trim())
            .map_err(|e| HandlerError::Decode(format!("not an IP address: {e}")))?;

        let ptr_name = ptr_name(&addr);
        let hosts = dns::resolve(&self.client, &ptr_name, "PTR").await?;

        if hosts.is_empty() {
            return Ok(IntelData::miss());
        }

        Ok(IntelData::hit(Map::new()).with("ptr", json!(hosts)))
    }
}

#[async_trait]
impl SourceHandler for IpHandler {
    async fn lookup(&self, source: &Source, query: &str) -> Result<IntelData, HandlerError> {
        match source.id.as_str() {
            "geolocation" => self.geolocation(query).await,
            "reverse_dns" => self.reverse_dns(query).await,
            other => Err(HandlerError::UnknownSource(other.to_string())),
        }
    }
}

/// Reverse-lookup name for an address
fn ptr_name(addr: &IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{d}.{c}.{b}.{a}.in-addr.arpa")
        }
        IpAddr::V6(v6) => {
            let nibbles: Vec<String> = v6
                .octets()
                .iter()
                .rev()
                .flat_map(|&byte| [byte & 0x0f, byte >> 4])
                .map(|n| format!("{n:x}"))
                .collect();
            format!("{}.ip6.arpa", nibbles.join("."))
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    country: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    city: Option<String>,
    isp: Option<String>,
    org: Option<String>,
    #[serde(rename = "as")]
    asn: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}
