//! Multi-domain runs: address maintenance, renewal checks and DNS-01 challenges.
//!
//! Domains are processed concurrently and fail independently: batch operations report a
//! [`DomainOutcome`] per domain instead of aborting at the first failure.

use crate::error::Error;
use crate::provider::ProviderAdapter;
use crate::records::RecordType;
use crate::renewal::CertificateAuthority;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug)]
pub struct DomainOutcome {
    pub domain: String,
    pub result: Result<(), Error>,
}

impl DomainOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// A DNS-01 challenge the certificate authority issued for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub domain: String,
    /// The TXT record value: the base64url digest of the key authorization.
    pub token: String,
}

/// An async trait describing the certificate authority client's side of a DNS-01 challenge:
/// told once the challenge record has propagated, it asks the authority to validate it.
#[async_trait::async_trait]
pub trait ChallengeValidator {
    async fn validate(&self, challenge: &Challenge) -> Result<(), Error>;
}

/// Make `ip4` the A records and `ip6` the AAAA records of every domain. An empty list leaves
/// that record type untouched.
pub async fn maintain_addresses(
    adapter: &ProviderAdapter,
    domains: &[String],
    ip4: &[Ipv4Addr],
    ip6: &[Ipv6Addr],
) -> Vec<DomainOutcome> {
    let ip4: Vec<String> = ip4.iter().map(ToString::to_string).collect();
    let ip6: Vec<String> = ip6.iter().map(ToString::to_string).collect();
    let updates = domains.iter().map(|domain| {
        let (ip4, ip6) = (&ip4, &ip6);
        async move {
            let result = async {
                if !ip4.is_empty() {
                    adapter
                        .reconcile_addresses(domain, RecordType::A, ip4)
                        .await?;
                }
                if !ip6.is_empty() {
                    adapter
                        .reconcile_addresses(domain, RecordType::AAAA, ip6)
                        .await?;
                }
                Ok::<(), Error>(())
            }
            .await;
            outcome(domain, "address update", result)
        }
    });
    join_all(updates).await
}

/// Ask the certificate authority client what it holds for `domains` and decide whether a new
/// certificate is needed.
///
/// # Errors
///
/// Returns whatever the certificate authority client fails with.
pub async fn check_renewal(
    adapter: &ProviderAdapter,
    ca: &(dyn CertificateAuthority + Send + Sync),
    domains: &[String],
    renew_within: Duration,
) -> Result<bool, Error> {
    let status = ca.status(domains).await?;
    Ok(adapter.evaluate_renewal(status.as_ref(), domains, renew_within))
}

/// Solve each challenge: install its record, wait for propagation, let `validator` ask for
/// validation and finally remove the record. Removal runs whatever happened before it.
///
/// Challenges writing the same record, such as `example.com` and `*.example.com`, are solved
/// one after the other since each expects to be the only value at that name. Distinct records
/// are solved concurrently.
pub async fn solve_challenges(
    adapter: &ProviderAdapter,
    challenges: &[Challenge],
    validator: &(dyn ChallengeValidator + Send + Sync),
) -> Vec<DomainOutcome> {
    let mut groups: BTreeMap<String, Vec<&Challenge>> = BTreeMap::new();
    let mut unresolved = Vec::new();
    for challenge in challenges {
        match adapter.resolve(&challenge.domain) {
            Ok(target) => groups
                .entry(target.challenge_fqdn())
                .or_default()
                .push(challenge),
            Err(err) => unresolved.push(outcome(&challenge.domain, "challenge", Err(err))),
        }
    }

    let runs = groups.into_values().map(|group| async move {
        let mut outcomes = Vec::with_capacity(group.len());
        for challenge in group {
            let result = solve_one(adapter, challenge, validator).await;
            outcomes.push(outcome(&challenge.domain, "challenge", result));
        }
        outcomes
    });
    unresolved.extend(join_all(runs).await.into_iter().flatten());
    unresolved
}

async fn solve_one(
    adapter: &ProviderAdapter,
    challenge: &Challenge,
    validator: &(dyn ChallengeValidator + Send + Sync),
) -> Result<(), Error> {
    let challenge_path = adapter.resolve(&challenge.domain)?.challenge_path;
    let result = async {
        adapter
            .install_challenge(&challenge.domain, &challenge.token)
            .await?;
        validator.validate(challenge).await
    }
    .await;
    adapter
        .remove_challenge(&challenge.domain, &challenge_path)
        .await;
    result
}

fn outcome(domain: &str, what: &str, result: Result<(), Error>) -> DomainOutcome {
    match &result {
        Ok(()) => info!(%domain, "{what} succeeded"),
        Err(err) => error!(%domain, "{what} failed: {err}"),
    }
    DomainOutcome {
        domain: domain.to_string(),
        result,
    }
}
