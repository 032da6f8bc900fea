//! Osprey Sources
//!
//! Source handlers behind the uniform lookup contract:
//! - **Domain**: certificate transparency, DNS-over-HTTPS records
//! - **Ip**: geolocation, reverse DNS
//! - **Email**: Gravatar probe, MX validation, username derivation
//! - **Username**: GitHub profile, platform existence probes
//!
//! The engine only sees [`SourceHandler`] and the closed
//! [`HandlerRegistry`]; everything else here is plumbing for the concrete
//! lookups.

pub mod client;
pub mod dns;
pub mod domain;
pub mod email;
pub mod handler;
pub mod ip;
pub mod username;

pub use client::*;
pub use domain::*;
pub use email::*;
pub use handler::*;
pub use ip::*;
pub use username::*;
