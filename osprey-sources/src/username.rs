//! Username sources
//!
//! - `github_profile`: the GitHub users API
//! - `platform_probe`: profile-page existence checks across well-known
//!   platforms

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map};
use tracing::debug;

use osprey_core::{IntelData, Source};

use crate::{HandlerError, SourceHandler};

/// Platforms probed by `platform_probe`, with `{user}` placeholders
const PLATFORMS: &[(&str, &str)] = &[
    ("github", "https://github.com/{user}"),
    ("gitlab", "https://gitlab.com/{user}"),
    ("codeberg", "https://codeberg.org/{user}"),
    ("reddit", "https://www.reddit.com/user/{user}/about.json"),
    ("mastodon.social", "https://mastodon.social/@{user}"),
    ("keybase", "https://keybase.io/{user}"),
];

const PROBE_CONCURRENCY: usize = 4;

pub struct UsernameHandler {
    client: Client,
}

impl UsernameHandler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn github_profile(&self, username: &str) -> Result<IntelData, HandlerError> {
        let url = format!(
            "https://api.github.com/users/{}",
            urlencoding::encode(username)
        );

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(IntelData::miss());
        }
        if !response.status().is_success() {
            return Err(HandlerError::Status(response.status()));
        }

        let user: GitHubUser = response
            .json()
            .await
            .map_err(|e| HandlerError::Decode(e.to_string()))?;

        let mut fields = Map::new();
        fields.insert("login".to_string(), json!(user.login));
        fields.insert("profile_url".to_string(), json!(user.html_url));
        fields.insert("public_repos".to_string(), json!(user.public_repos));
        for (key, value) in [
            ("name", user.name),
            ("company", user.company),
            ("location", user.location),
            ("blog", user.blog.filter(|b| !b.is_empty())),
            ("created_at", user.created_at),
        ] {
            if let Some(value) = value {
                fields.insert(key.to_string(), json!(value));
            }
        }

        Ok(IntelData::hit(fields))
    }

    async fn platform_probe(&self, username: &str) -> Result<IntelData, HandlerError> {
        let targets: Vec<(String, String)> = PLATFORMS
            .iter()
            .map(|(platform, template)| {
                (
                    platform.to_string(),
                    probe_url(template, username),
                )
            })
            .collect();

        let outcomes: Vec<Option<(String, String)>> = stream::iter(targets)
            .map(|(platform, url)| {
                let client = self.client.clone();
                async move {
                    match client.get(&url).send().await {
                        Ok(response) if response.status().is_success() => {
                            Some((platform, url))
                        }
                        Ok(response) => {
                            debug!("Probe {} returned {}", platform, response.status());
                            None
                        }
                        Err(e) => {
                            debug!("Probe {} failed: {}", platform, e);
                            None
                        }
                    }
                }
            })
            .buffer_unordered(PROBE_CONCURRENCY)
            .collect()
            .await;

        let profiles: Vec<_> = outcomes
            .into_iter()
            .flatten()
            .map(|(platform, url)| json!({ "platform": platform, "url": url }))
            .collect();

        if profiles.is_empty() {
            return Ok(IntelData::miss().with("checked", json!(PLATFORMS.len())));
        }

        Ok(IntelData::hit(Map::new())
            .with("profiles", json!(profiles))
            .with("checked", json!(PLATFORMS.len())))
    }
}

#[async_trait]
impl SourceHandler for UsernameHandler {
    async fn lookup(&self, source: &Source, query: &str) -> Result<IntelData, HandlerError> {
        match source.id.as_str() {
            "github_profile" => self.github_profile(query).await,
            "platform_probe" => self.platform_probe(query).await,
            other => Err(HandlerError::UnknownSource(other.to_string())),
        }
    }
}

fn probe_url(template: &str, username: &str) -> String {
    template.replace("{user}", &urlencoding::encode(username))
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
    html_url: String,
    public_repos: u32,
    name: Option<String>,
    company: Option<String>,
    location: Option<String>,
    blog: Option<String>,
    created_at: Option<String>,
}
