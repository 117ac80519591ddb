//! Built-in providers, selected by name in the configuration.
//!
//! ```json
//! "provider": { "plugin": "file", "config": { "path": "/var/lib/wildcrab/zones.json" } }
//! ```
//!
//! The `plugin` tag deserializes straight into a [`ProviderConfig`] variant, so an unknown
//! provider name is rejected when the configuration is loaded rather than when a challenge is
//! first requested.

use crate::error::Error;
use crate::zone_client::{DynZoneClient, FileZoneClient, InMemoryZoneClient};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "plugin", content = "config", rename_all = "lowercase")]
pub enum ProviderConfig {
    Memory(MemoryProviderConfig),
    File(FileProviderConfig),
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MemoryProviderConfig {
    pub zones: Vec<String>,
    /// Nameservers reported for every zone.
    #[serde(default)]
    pub nameservers: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileProviderConfig {
    pub path: PathBuf,
    /// Zones added to the database when it doesn't hold them yet.
    #[serde(default)]
    pub zones: Vec<String>,
}

impl ProviderConfig {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::Memory(_) => "memory",
            ProviderConfig::File(_) => "file",
        }
    }

    /// Construct the configured client.
    ///
    /// # Errors
    ///
    /// Returns whatever the provider's constructor fails with, e.g. [`Error::IO`] or
    /// [`Error::InvalidJSON`] for an unreadable zone database.
    pub async fn build(&self) -> Result<DynZoneClient, Error> {
        match self {
            ProviderConfig::Memory(config) => {
                let client = InMemoryZoneClient::new(config.zones.iter().cloned());
                for zone in &config.zones {
                    client
                        .set_nameservers(zone, config.nameservers.clone())
                        .await?;
                }
                Ok(Arc::new(client))
            }
            ProviderConfig::File(config) => Ok(Arc::new(
                FileZoneClient::try_from_file(&config.path, &config.zones).await?,
            )),
        }
    }
}
