//! A JSON file-backed implementation of the [`ZoneManagementClient`][super::ZoneManagementClient]
//! trait.
//!
//! Wraps a [`InMemoryZoneClient`][super::memory::InMemoryZoneClient] instance. Record changes
//! are staged in memory and persisted to a JSON zone database on disk when a zone's changes are
//! committed.
use crate::error::Error;
use crate::records::{DesiredRecord, ExistingRecord, RecordType};
use crate::zone_client::memory::{InMemoryZoneClient, ZoneState};
use crate::zone_client::ZoneManagementClient;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// A file-backed zone management client. After each commit the JSON zone database on disk is
/// rewritten with the full state so it can be reloaded across restarts, or served by an
/// authoritative nameserver reading it.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct FileZoneClient {
    client: InMemoryZoneClient,
    path: PathBuf,
}

impl FileZoneClient {
    /// Save the state of the zone database as JSON to the client's configured path, or return
    /// an Error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJSON`] if the state can't be serialized to JSON.
    ///
    /// Returns [`Error::IO`] if the serialized state can't be written to the backing file path.
    pub async fn save(&self) -> Result<(), Error> {
        let data = serde_json::to_string_pretty(&self.client.snapshot().await)?;
        let mut output_file = File::create(&self.path).await?;
        output_file.write_all(data.as_bytes()).await?;
        output_file.flush().await?;
        Ok(())
    }

    /// Load a [`FileZoneClient`] from the JSON zone database located at the given path, creating
    /// an empty database if none exists, and make sure each of `zones` is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJSON`] if the JSON zone database is invalid.
    ///
    /// Returns [`Error::IO`] if the path can't be opened, read or created.
    pub async fn try_from_file(p: impl AsRef<Path>, zones: &[String]) -> Result<Self, Error> {
        let p = p.as_ref();
        let contents = match File::open(p).await {
            Ok(mut f) => {
                let mut buf = vec![];
                f.read_to_end(&mut buf).await?;
                buf
            }
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Self::write_empty_state(File::create(p).await?).await?,
                _ => return Err(Error::IO(err)),
            },
        };

        let state: ZoneState = serde_json::from_slice(&contents)?;
        let client = InMemoryZoneClient::from_state(state);
        for zone in zones {
            client.ensure_zone(zone).await;
        }
        debug!(path = %p.display(), "loaded zone database");
        Ok(Self {
            client,
            path: p.to_path_buf(),
        })
    }

    async fn write_empty_state(mut f: File) -> io::Result<Vec<u8>> {
        let default_data = serde_json::to_string_pretty(&ZoneState::default())?;
        let default_bytes = default_data.as_bytes();
        f.write_all(default_bytes).await?;
        f.flush().await?;
        Ok(default_bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl ZoneManagementClient for FileZoneClient {
    async fn list_owned_zones(&self) -> Result<Vec<String>, Error> {
        self.client.list_owned_zones().await
    }

    async fn list_records(
        &self,
        zone: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<ExistingRecord>, Error> {
        self.client.list_records(zone, record_type, name).await
    }

    async fn create_record(&self, zone: &str, record: &DesiredRecord) -> Result<String, Error> {
        self.client.create_record(zone, record).await
    }

    async fn delete_record(&self, zone: &str, provider_id: &str) -> Result<(), Error> {
        self.client.delete_record(zone, provider_id).await
    }

    async fn commit_zone_changes(&self, zone: &str) -> Result<(), Error> {
        self.save().await?;
        debug!(%zone, path = %self.path.display(), "committed zone changes");
        Ok(())
    }

    async fn list_nameservers(&self, zone: &str) -> Result<Vec<String>, Error> {
        self.client.list_nameservers(zone).await
    }
}
