//! The provider adapter: DNS-01 challenge and address-record lifecycles on top of a
//! [`ZoneManagementClient`][crate::zone_client::ZoneManagementClient].

use crate::dns::PropagationVerifier;
use crate::error::Error;
use crate::records::{self, DesiredRecord, ReconciliationPlan, RecordType};
use crate::renewal::{self, CertificateStatus};
use crate::zone::{ResolvedTarget, ZoneMap};
use crate::zone_client::{DynZoneClient, ZoneManagementClient};
use std::collections::BTreeSet;
use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterSettings {
    pub challenge_ttl: u32,
    pub address_ttl: u32,
    /// Propagation budget for every written record set.
    pub max_wait: Duration,
    /// Attempts for provider reads failing with [`Error::ProviderTransport`].
    pub read_attempts: u32,
    /// Pause before the first read retry, doubled for each further one.
    pub read_backoff: Duration,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        AdapterSettings {
            challenge_ttl: 600,
            address_ttl: 600,
            max_wait: Duration::from_secs(10 * 60),
            read_attempts: 3,
            read_backoff: Duration::from_millis(500),
        }
    }
}

/// Composes zone resolution, reconciliation and propagation checks for one provider account.
///
/// The [`ZoneMap`] is built once from the account's zones and never changes, so one adapter
/// may serve any number of concurrent domain operations.
pub struct ProviderAdapter {
    client: DynZoneClient,
    zones: ZoneMap,
    verifier: PropagationVerifier,
    settings: AdapterSettings,
}

impl ProviderAdapter {
    /// Load the zones the account owns and build the adapter around them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoOwnedZones`] if the account owns no zone, or the provider's error
    /// once listing zones has failed `read_attempts` times.
    pub async fn new(
        client: DynZoneClient,
        verifier: PropagationVerifier,
        settings: AdapterSettings,
    ) -> Result<Self, Error> {
        let owned =
            retry_read(&settings, "list owned zones", || client.list_owned_zones()).await?;
        if owned.is_empty() {
            return Err(Error::NoOwnedZones);
        }
        info!(zones = ?owned, "loaded provider zones");
        Ok(ProviderAdapter {
            zones: ZoneMap::new(&owned),
            client,
            verifier,
            settings,
        })
    }

    #[must_use]
    pub fn zones(&self) -> &ZoneMap {
        &self.zones
    }

    #[must_use]
    pub fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    /// Resolve `domain` against the account's zones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZoneNotFound`] if the account doesn't own a zone for `domain`.
    pub fn resolve(&self, domain: &str) -> Result<ResolvedTarget, Error> {
        self.zones.resolve(domain)
    }

    /// Make `token` the only TXT value at the challenge record of `domain` and wait until every
    /// authoritative nameserver serves it. Returns the challenge path relative to the zone.
    ///
    /// A record that fails to propagate is left in place; callers remove it with
    /// [`ProviderAdapter::remove_challenge`] whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZoneNotFound`], the provider's error for a failed write,
    /// [`Error::NoAuthoritativeNameservers`] or [`Error::TimeoutExceeded`].
    pub async fn install_challenge(&self, domain: &str, token: &str) -> Result<String, Error> {
        let target = self.zones.resolve(domain)?;
        info!(
            %domain,
            zone = %target.zone,
            challenge = %target.challenge_path,
            "installing challenge"
        );
        self.publish_challenge(&target, BTreeSet::from([token.to_string()]))
            .await?;
        Ok(target.challenge_path)
    }

    /// Add `token` to the TXT values at the challenge record of `domain` and wait until every
    /// authoritative nameserver serves the whole set. Returns the challenge path relative to the
    /// zone.
    ///
    /// Values already present are kept: `example.com` and `*.example.com` share one challenge
    /// record, and ACME clients present both tokens before asking for either validation.
    ///
    /// # Errors
    ///
    /// Same as [`ProviderAdapter::install_challenge`].
    pub async fn present_challenge(&self, domain: &str, token: &str) -> Result<String, Error> {
        let target = self.zones.resolve(domain)?;
        let mut values = self
            .challenge_values(&target.zone, &target.challenge_path)
            .await?;
        values.insert(token.to_string());
        info!(
            %domain,
            zone = %target.zone,
            challenge = %target.challenge_path,
            values = values.len(),
            "presenting challenge"
        );
        self.publish_challenge(&target, values).await?;
        Ok(target.challenge_path)
    }

    /// Remove only the `token` TXT value at the challenge record of `domain`, leaving tokens of
    /// other pending challenges in place. Best effort: errors are logged, never returned.
    pub async fn withdraw_challenge(&self, domain: &str, token: &str) {
        let res = async {
            let target = self.zones.resolve(domain)?;
            let mut values = self
                .challenge_values(&target.zone, &target.challenge_path)
                .await?;
            values.remove(token);
            let desired = self.challenge_records(&target.challenge_path, &values);
            self.reconcile(
                &target.zone,
                RecordType::TXT,
                &target.challenge_path,
                &desired,
            )
            .await
        }
        .await;
        match res {
            Ok(plan) => info!(
                %domain,
                removed = plan.to_remove_ids.len(),
                "challenge token withdrawn"
            ),
            Err(err) => warn!(%domain, "challenge token cleanup failed: {err}"),
        }
    }

    /// Remove every TXT record at `challenge_path` in the zone of `domain`. Best effort: errors
    /// are logged, never returned.
    pub async fn remove_challenge(&self, domain: &str, challenge_path: &str) {
        let res = async {
            let target = self.zones.resolve(domain)?;
            self.reconcile(&target.zone, RecordType::TXT, challenge_path, &[])
                .await
        }
        .await;
        match res {
            Ok(plan) => info!(
                %domain,
                %challenge_path,
                removed = plan.to_remove_ids.len(),
                "challenge removed"
            ),
            Err(err) => warn!(%domain, %challenge_path, "challenge cleanup failed: {err}"),
        }
    }

    /// Make `values` the exact set of `record_type` addresses for `domain`, then wait for the
    /// change to propagate. Wildcard domains manage the `*` record itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedRecordType`] for anything but `A`/`AAAA`,
    /// [`Error::InvalidRecordValue`] for a value of the wrong address family, and otherwise the
    /// same errors as [`ProviderAdapter::install_challenge`].
    pub async fn reconcile_addresses(
        &self,
        domain: &str,
        record_type: RecordType,
        values: &[String],
    ) -> Result<(), Error> {
        let values = normalize_addresses(record_type, values)?;
        let target = self.zones.resolve(domain)?;
        let name = target.record_name();
        info!(%domain, zone = %target.zone, %record_type, ?values, "setting addresses");

        let desired: Vec<DesiredRecord> = values
            .iter()
            .map(|value| DesiredRecord {
                record_type,
                name: name.clone(),
                value: value.clone(),
                ttl: self.settings.address_ttl,
            })
            .collect();
        let plan = self
            .reconcile(&target.zone, record_type, &name, &desired)
            .await?;
        if plan.is_empty() || values.is_empty() {
            return Ok(());
        }

        let hosts = self.authoritative_hosts(&target).await?;
        let fqdn = if name.is_empty() {
            target.zone.clone()
        } else {
            format!("{name}.{}", target.zone)
        };
        self.verifier
            .verify(
                &hosts,
                record_type.into(),
                &fqdn,
                &values,
                self.settings.max_wait,
            )
            .await
    }

    /// Whether the held certificate must be renewed, see [`renewal::should_renew`].
    #[must_use]
    pub fn evaluate_renewal(
        &self,
        status: Option<&CertificateStatus>,
        requested_domains: &[String],
        renew_within: Duration,
    ) -> bool {
        renewal::should_renew(status, requested_domains, renew_within)
    }

    /// Make `values` the TXT set at the challenge record of `target`, then verify it.
    async fn publish_challenge(
        &self,
        target: &ResolvedTarget,
        values: BTreeSet<String>,
    ) -> Result<(), Error> {
        let desired = self.challenge_records(&target.challenge_path, &values);
        self.reconcile(&target.zone, RecordType::TXT, &target.challenge_path, &desired)
            .await?;

        let hosts = self.authoritative_hosts(target).await?;
        self.verifier
            .verify(
                &hosts,
                RecordType::TXT.into(),
                &target.challenge_fqdn(),
                &values,
                self.settings.max_wait,
            )
            .await
    }

    async fn challenge_values(
        &self,
        zone: &str,
        challenge_path: &str,
    ) -> Result<BTreeSet<String>, Error> {
        let existing = retry_read(&self.settings, "list records", || {
            self.client
                .list_records(zone, RecordType::TXT, challenge_path)
        })
        .await?;
        Ok(existing.into_iter().map(|record| record.value).collect())
    }

    fn challenge_records(
        &self,
        challenge_path: &str,
        values: &BTreeSet<String>,
    ) -> Vec<DesiredRecord> {
        values
            .iter()
            .map(|value| DesiredRecord {
                record_type: RecordType::TXT,
                name: challenge_path.to_string(),
                value: value.clone(),
                ttl: self.settings.challenge_ttl,
            })
            .collect()
    }

    async fn reconcile(
        &self,
        zone: &str,
        record_type: RecordType,
        name: &str,
        desired: &[DesiredRecord],
    ) -> Result<ReconciliationPlan, Error> {
        let existing = retry_read(&self.settings, "list records", || {
            self.client.list_records(zone, record_type, name)
        })
        .await?;

        let plan = records::plan(&existing, desired, record_type, name);
        if plan.duplicates > 0 {
            warn!(
                %zone,
                %name,
                %record_type,
                duplicates = plan.duplicates,
                "provider holds duplicate records, removing them"
            );
        }
        if plan.is_empty() {
            debug!(%zone, %name, %record_type, "records already up to date");
            return Ok(plan);
        }

        for record in &plan.to_create {
            let provider_id = self.client.create_record(zone, record).await?;
            debug!(%zone, %name, value = %record.value, %provider_id, "created record");
        }
        for provider_id in &plan.to_remove_ids {
            self.client.delete_record(zone, provider_id).await?;
            debug!(%zone, %name, %provider_id, "deleted record");
        }
        self.client.commit_zone_changes(zone).await?;

        info!(
            %zone,
            %name,
            %record_type,
            created = plan.to_create.len(),
            removed = plan.to_remove_ids.len(),
            "records reconciled"
        );
        Ok(plan)
    }

    /// Nameservers to verify `target` against: the DNS delegation if one is found, otherwise
    /// whatever the provider reports for the zone.
    async fn authoritative_hosts(&self, target: &ResolvedTarget) -> Result<Vec<SocketAddr>, Error> {
        let hosts = self.verifier.discover(&target.fqdn()).await;
        if !hosts.is_empty() {
            return Ok(hosts);
        }

        debug!(zone = %target.zone, "no delegation found, asking the provider");
        let names = match retry_read(&self.settings, "list nameservers", || {
            self.client.list_nameservers(&target.zone)
        })
        .await
        {
            Ok(names) => names,
            Err(err) => {
                warn!(zone = %target.zone, "listing nameservers failed: {err}");
                Vec::new()
            }
        };
        let hosts = self.verifier.resolve_hosts(&names).await;
        if hosts.is_empty() {
            return Err(Error::NoAuthoritativeNameservers(target.zone.clone()));
        }
        Ok(hosts)
    }
}

/// Run a provider read, retrying transport failures with a doubling pause.
async fn retry_read<T, F, Fut>(
    settings: &AdapterSettings,
    what: &str,
    mut op: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut backoff = settings.read_backoff;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(Error::ProviderTransport(msg)) if attempt < settings.read_attempts => {
                warn!(attempt, "{what} failed, retrying in {backoff:?}: {msg}");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            res => return res,
        }
    }
}

fn normalize_addresses(
    record_type: RecordType,
    values: &[String],
) -> Result<BTreeSet<String>, Error> {
    let invalid = |value: &String| Error::InvalidRecordValue {
        record_type: record_type.to_string(),
        value: value.clone(),
    };
    values
        .iter()
        .map(|value| match record_type {
            RecordType::A => value
                .trim()
                .parse::<Ipv4Addr>()
                .map(|ip| ip.to_string())
                .map_err(|_| invalid(value)),
            RecordType::AAAA => value
                .trim()
                .parse::<Ipv6Addr>()
                .map(|ip| ip.to_string())
                .map_err(|_| invalid(value)),
            other => Err(Error::UnsupportedRecordType(other.to_string())),
        })
        .collect()
}
