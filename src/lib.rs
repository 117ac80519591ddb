//! Wildcrab
//!
//! Keeps the DNS side of a (wildcard) certificate in order at a DNS hosting provider.
//!
//! Solves [RFC-8555][RFC-8555] [DNS-01] challenges by writing the challenge TXT record into
//! whichever zone the provider account owns for a domain, and holds each challenge until every
//! authoritative nameserver of that zone serves it. Optionally keeps the domains' A and AAAA
//! records pointed at configured addresses, and decides when the held certificate is due for
//! renewal.
//!
//! External ACME clients drive challenges through the [hook API][crate::api]. Providers are
//! reached through the [`ZoneManagementClient`][crate::zone_client::ZoneManagementClient]
//! trait; [`InMemoryZoneClient`] and [`FileZoneClient`] are provided.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
//!
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
pub mod dns;
pub mod error;
pub mod provider;
pub mod records;
pub mod renewal;
pub mod workflow;
pub mod zone;
pub mod zone_client;

pub use api::new as new_http;
pub use config::{Config, SharedConfig};
pub use provider::{AdapterSettings, ProviderAdapter};
pub use zone_client::{FileZoneClient, InMemoryZoneClient};
