//! Zone management clients.
//!
//! Supports a generic interface for listing the zones a DNS provider account owns and for
//! listing, creating and deleting records within them.
//!
//! Two implementations are provided, [`memory::InMemoryZoneClient`] and
//! [`file::FileZoneClient`]. The former keeps every record in process and is useful for dry
//! runs. The latter keeps a JSON zone database on disk, staging changes until
//! [`ZoneManagementClient::commit_zone_changes`] is called.
//!
//! Clients are selected by the `dns.provider` section of the
//! [configuration][crate::config::Config], see [`ProviderConfig`].

use crate::error::Error;
use crate::records::{DesiredRecord, ExistingRecord, RecordType};
use std::sync::Arc;

pub mod file;
pub mod memory;
pub mod registry;

#[allow(clippy::module_name_repetitions)]
pub use file::FileZoneClient;
#[allow(clippy::module_name_repetitions)]
pub use memory::InMemoryZoneClient;
pub use registry::ProviderConfig;

/// `DynZoneClient` is a type alias for a [`ZoneManagementClient`] shared by concurrent domain
/// operations. Implementations synchronize internally.
#[allow(clippy::module_name_repetitions)]
pub type DynZoneClient = Arc<dyn ZoneManagementClient + Send + Sync>;

/// An async trait describing a DNS provider account. Record names are relative to their zone
/// and empty at the apex; clients translate to their provider's own apex notation.
#[async_trait::async_trait]
pub trait ZoneManagementClient {
    /// Names of every zone the account owns.
    async fn list_owned_zones(&self) -> Result<Vec<String>, Error>;

    /// Records of `record_type` named `name` in `zone`.
    async fn list_records(
        &self,
        zone: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<ExistingRecord>, Error>;

    /// Create a record in `zone`, returning the provider's id for it.
    async fn create_record(&self, zone: &str, record: &DesiredRecord) -> Result<String, Error>;

    /// Delete the record with the given provider id from `zone`.
    async fn delete_record(&self, zone: &str, provider_id: &str) -> Result<(), Error>;

    /// Publish changes made to `zone`, for providers that stage them.
    async fn commit_zone_changes(&self, _zone: &str) -> Result<(), Error> {
        Ok(())
    }

    /// Nameservers the provider reports for `zone`, if it knows them.
    async fn list_nameservers(&self, _zone: &str) -> Result<Vec<String>, Error> {
        Ok(Vec::new())
    }
}
