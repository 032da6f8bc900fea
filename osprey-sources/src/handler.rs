//! The uniform source handler contract

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use osprey_core::{Category, IntelData, Source};

use crate::{DomainHandler, EmailHandler, IpHandler, UsernameHandler};

/// Errors from source handlers
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("timed out after {0} seconds")]
    Timeout(u64),

    #[error("source {0} has no handler")]
    UnknownSource(String),
}

/// One category's lookup implementation
///
/// Handlers may suspend on network I/O. The returned [`IntelData`] must
/// carry `found`; additional fields are category-specific and opaque to
/// the engine. A handler never sees targets for other categories.
#[async_trait]
pub trait SourceHandler: Send + Sync {
    async fn lookup(&self, source: &Source, query: &str) -> Result<IntelData, HandlerError>;
}

/// Closed registry mapping each category to its handler
///
/// Total over [`Category`], so there is no "unknown category" at dispatch
/// time; an unknown category key in the catalog document already failed
/// the load. Unknown *source ids* within a category surface as
/// [`HandlerError::UnknownSource`] from the handler itself.
#[derive(Clone)]
pub struct HandlerRegistry {
    email: Arc<dyn SourceHandler>,
    domain: Arc<dyn SourceHandler>,
    ip: Arc<dyn SourceHandler>,
    username: Arc<dyn SourceHandler>,
}

impl HandlerRegistry {
    pub fn new(
        email: Arc<dyn SourceHandler>,
        domain: Arc<dyn SourceHandler>,
        ip: Arc<dyn SourceHandler>,
        username: Arc<dyn SourceHandler>,
    ) -> Self {
        Self {
            email,
            domain,
            ip,
            username,
        }
    }

    /// Registry wired with the production handlers
    pub fn with_defaults(client: Client) -> Self {
        Self::new(
            Arc::new(EmailHandler::new(client.clone())),
            Arc::new(DomainHandler::new(client.clone())),
            Arc::new(IpHandler::new(client.clone())),
            Arc::new(UsernameHandler::new(client)),
        )
    }

    /// One handler for every category (test doubles)
    pub fn uniform(handler: Arc<dyn SourceHandler>) -> Self {
        Self::new(
            handler.clone(),
            handler.clone(),
            handler.clone(),
            handler,
        )
    }

    pub fn handler(&self, category: Category) -> &dyn SourceHandler {
        match category {
            Category::Email => self.email.as_ref(),
            Category::Domain => self.domain.as_ref(),
            Category::Ip => self.ip.as_ref(),
            Category::Username => self.username.as_ref(),
        }
    }
}
