use crate::error::Error;
use crate::records::{DesiredRecord, ExistingRecord, RecordType};
use crate::zone_client::ZoneManagementClient;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Every record of every owned zone, plus the counter handing out record ids.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneState {
    #[serde(default)]
    pub zones: BTreeMap<String, ZoneData>,
    #[serde(default)]
    pub next_id: u64,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneData {
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(default)]
    pub records: Vec<ExistingRecord>,
}

impl ZoneState {
    fn zone(&self, zone: &str) -> Result<&ZoneData, Error> {
        self.zones
            .get(zone)
            .ok_or_else(|| Error::ProviderTransport(format!("zone \"{zone}\" is not managed")))
    }

    fn zone_mut(&mut self, zone: &str) -> Result<&mut ZoneData, Error> {
        self.zones
            .get_mut(zone)
            .ok_or_else(|| Error::ProviderTransport(format!("zone \"{zone}\" is not managed")))
    }
}

/// An in-process zone management client. Nothing survives a restart.
#[derive(Default, Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct InMemoryZoneClient {
    state: RwLock<ZoneState>,
}

impl InMemoryZoneClient {
    pub fn new<I, S>(zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let zones = zones
            .into_iter()
            .map(|zone| (zone.into(), ZoneData::default()))
            .collect();
        Self::from_state(ZoneState { zones, next_id: 0 })
    }

    #[must_use]
    pub fn from_state(state: ZoneState) -> Self {
        InMemoryZoneClient {
            state: RwLock::new(state),
        }
    }

    /// Set the nameservers reported for an owned zone.
    pub async fn set_nameservers(&self, zone: &str, nameservers: Vec<String>) -> Result<(), Error> {
        self.state.write().await.zone_mut(zone)?.nameservers = nameservers;
        Ok(())
    }

    /// Add `zone` to the owned zones unless it is already there.
    pub async fn ensure_zone(&self, zone: &str) {
        self.state
            .write()
            .await
            .zones
            .entry(zone.to_string())
            .or_default();
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> ZoneState {
        self.state.read().await.clone()
    }
}

#[async_trait::async_trait]
impl ZoneManagementClient for InMemoryZoneClient {
    async fn list_owned_zones(&self) -> Result<Vec<String>, Error> {
        Ok(self.state.read().await.zones.keys().cloned().collect())
    }

    async fn list_records(
        &self,
        zone: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<ExistingRecord>, Error> {
        let state = self.state.read().await;
        Ok(state
            .zone(zone)?
            .records
            .iter()
            .filter(|r| r.record_type == record_type && r.name == name)
            .cloned()
            .collect())
    }

    async fn create_record(&self, zone: &str, record: &DesiredRecord) -> Result<String, Error> {
        let mut state = self.state.write().await;
        state.zone(zone)?;
        state.next_id += 1;
        let provider_id = state.next_id.to_string();
        state.zone_mut(zone)?.records.push(ExistingRecord {
            record_type: record.record_type,
            name: record.name.clone(),
            value: record.value.clone(),
            ttl: record.ttl,
            provider_id: provider_id.clone(),
        });
        Ok(provider_id)
    }

    async fn delete_record(&self, zone: &str, provider_id: &str) -> Result<(), Error> {
        let mut state = self.state.write().await;
        let data = state.zone_mut(zone)?;
        let before = data.records.len();
        data.records.retain(|r| r.provider_id != provider_id);
        if data.records.len() == before {
            return Err(Error::ProviderTransport(format!(
                "record {provider_id} not found in \"{zone}\""
            )));
        }
        Ok(())
    }

    async fn list_nameservers(&self, zone: &str) -> Result<Vec<String>, Error> {
        Ok(self.state.read().await.zone(zone)?.nameservers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txt(name: &str, value: &str) -> DesiredRecord {
        DesiredRecord {
            record_type: RecordType::TXT,
            name: name.to_string(),
            value: value.to_string(),
            ttl: 600,
        }
    }

    #[tokio::test]
    async fn test_create_list_delete() {
        let client = InMemoryZoneClient::new(["example.com"]);
        assert_eq!(
            client.list_owned_zones().await.unwrap(),
            vec!["example.com".to_string()]
        );

        let first = client
            .create_record("example.com", &txt("_acme-challenge", "one"))
            .await
            .unwrap();
        let second = client
            .create_record("example.com", &txt("_acme-challenge.www", "two"))
            .await
            .unwrap();
        assert_ne!(first, second);

        let records = client
            .list_records("example.com", RecordType::TXT, "_acme-challenge")
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "one");
        assert_eq!(records[0].provider_id, first);

        client.delete_record("example.com", &first).await.unwrap();
        assert!(client
            .list_records("example.com", RecordType::TXT, "_acme-challenge")
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            client.delete_record("example.com", &first).await,
            Err(Error::ProviderTransport(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_zone() {
        let client = InMemoryZoneClient::new(["example.com"]);
        assert!(matches!(
            client
                .create_record("example.org", &txt("_acme-challenge", "x"))
                .await,
            Err(Error::ProviderTransport(_))
        ));
        assert!(client.list_nameservers("example.org").await.is_err());
    }

    #[tokio::test]
    async fn test_nameservers() {
        let client = InMemoryZoneClient::new(["example.com"]);
        assert!(client.list_nameservers("example.com").await.unwrap().is_empty());
        client
            .set_nameservers("example.com", vec!["ns1.example.net".to_string()])
            .await
            .unwrap();
        assert_eq!(
            client.list_nameservers("example.com").await.unwrap(),
            vec!["ns1.example.net".to_string()]
        );
    }
}
