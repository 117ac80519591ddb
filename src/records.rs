//! Record types and reconciliation of a provider's live records against a desired set.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    A,
    AAAA,
    TXT,
    CNAME,
    SRV,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
            RecordType::TXT => "TXT",
            RecordType::CNAME => "CNAME",
            RecordType::SRV => "SRV",
        };
        f.write_str(s)
    }
}

impl From<RecordType> for trust_dns_client::rr::RecordType {
    fn from(record_type: RecordType) -> Self {
        match record_type {
            RecordType::A => Self::A,
            RecordType::AAAA => Self::AAAA,
            RecordType::TXT => Self::TXT,
            RecordType::CNAME => Self::CNAME,
            RecordType::SRV => Self::SRV,
        }
    }
}

/// A record the caller wants to exist. `name` is relative to the zone, empty at the apex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesiredRecord {
    pub record_type: RecordType,
    pub name: String,
    pub value: String,
    pub ttl: u32,
}

/// A record as reported by a provider, identified by the provider's own id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExistingRecord {
    pub record_type: RecordType,
    pub name: String,
    pub value: String,
    pub ttl: u32,
    pub provider_id: String,
}

/// Mutations that bring one `(record type, label)` record set to its desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub to_create: Vec<DesiredRecord>,
    pub to_remove_ids: Vec<String>,
    /// Existing records removed only because they repeated another record's value.
    pub duplicates: usize,
}

impl ReconciliationPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_remove_ids.is_empty()
    }
}

impl From<ExistingRecord> for DesiredRecord {
    fn from(record: ExistingRecord) -> Self {
        DesiredRecord {
            record_type: record.record_type,
            name: record.name,
            value: record.value,
            ttl: record.ttl,
        }
    }
}

/// Compute the creations and removals that make the `record_type` records at `label` hold
/// exactly the desired values.
///
/// Records are keyed by `(label, value)`. Existing records repeating a key are always removed,
/// keeping the copy with the lowest provider id, so the plan doesn't depend on input order.
/// Ids that parse as integers compare numerically and sort before any other id.
/// Applying the plan and planning again yields an empty plan.
#[must_use]
pub fn plan(
    existing: &[ExistingRecord],
    desired: &[DesiredRecord],
    record_type: RecordType,
    label: &str,
) -> ReconciliationPlan {
    let wanted: BTreeSet<&str> = desired
        .iter()
        .filter(|r| r.record_type == record_type && r.name == label)
        .map(|r| r.value.as_str())
        .collect();

    let mut current: Vec<&ExistingRecord> = existing
        .iter()
        .filter(|r| r.record_type == record_type && r.name == label)
        .collect();
    current.sort_by(|a, b| id_order_key(&a.provider_id).cmp(&id_order_key(&b.provider_id)));

    let mut occupied: HashSet<&str> = HashSet::with_capacity(current.len());
    let mut to_remove_ids = BTreeSet::new();
    let mut duplicates = 0;
    for record in current {
        if !occupied.insert(record.value.as_str()) {
            duplicates += 1;
            to_remove_ids.insert(record.provider_id.clone());
        } else if !wanted.contains(record.value.as_str()) {
            to_remove_ids.insert(record.provider_id.clone());
        }
    }

    let mut created = BTreeSet::new();
    let to_create = desired
        .iter()
        .filter(|r| r.record_type == record_type && r.name == label)
        .filter(|r| !occupied.contains(r.value.as_str()))
        .filter(|r| created.insert(r.value.as_str()))
        .cloned()
        .collect();

    ReconciliationPlan {
        to_create,
        to_remove_ids: to_remove_ids.into_iter().collect(),
        duplicates,
    }
}

fn id_order_key(provider_id: &str) -> (bool, u64, &str) {
    match provider_id.parse::<u64>() {
        Ok(n) => (false, n, provider_id),
        Err(_) => (true, 0, provider_id),
    }
}
