//! Authoritative nameserver discovery and propagation polling.

use crate::dns::resolver::DynResolver;
use crate::error::Error;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{debug, info, trace, warn};
use trust_dns_client::rr::RecordType;

const DNS_PORT: u16 = 53;

/// Timing of a propagation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationSettings {
    /// Pause between two queries to the same nameserver.
    pub poll_interval: Duration,
    /// Bound on a single query, independent of the overall deadline.
    pub query_timeout: Duration,
}

impl Default for PropagationSettings {
    fn default() -> Self {
        PropagationSettings {
            poll_interval: Duration::from_secs(5),
            query_timeout: Duration::from_secs(3),
        }
    }
}

/// Verifies records against the authoritative nameservers of a zone.
#[derive(Clone)]
pub struct PropagationVerifier {
    resolver: DynResolver,
    upstream: SocketAddr,
    settings: PropagationSettings,
}

impl PropagationVerifier {
    /// Create a verifier sending discovery queries to the `upstream` recursive resolver.
    #[must_use]
    pub fn new(resolver: DynResolver, upstream: SocketAddr, settings: PropagationSettings) -> Self {
        PropagationVerifier {
            resolver,
            upstream,
            settings,
        }
    }

    /// Find the nameservers authoritative for `domain`.
    ///
    /// `domain` is shortened one label at a time, down to its last two labels, until the
    /// upstream resolver returns NS records. This finds the delegation point even when the
    /// owned zone is itself a subdomain. The first non-empty answer's targets are resolved to
    /// IPv4 socket addresses. Failed or empty lookups along the way are expected.
    pub async fn discover(&self, domain: &str) -> Vec<SocketAddr> {
        let domain = domain.trim_end_matches('.');
        let labels: Vec<&str> = domain.split('.').collect();
        for start in 0..labels.len().saturating_sub(1) {
            let candidate = labels[start..].join(".");
            match self
                .query_with_timeout(self.upstream, &candidate, RecordType::NS)
                .await
            {
                Ok(nameservers) if !nameservers.is_empty() => {
                    debug!(%candidate, ?nameservers, "found delegation");
                    return self.resolve_hosts(&nameservers).await;
                }
                Ok(_) => trace!(%candidate, "no NS records"),
                Err(err) => debug!(%candidate, "NS lookup failed: {err}"),
            }
        }
        Vec::new()
    }

    /// Resolve nameserver host names, or literal addresses, to socket addresses on port 53.
    pub async fn resolve_hosts(&self, names: &[String]) -> Vec<SocketAddr> {
        let lookups = names.iter().map(|name| async move {
            if let Ok(ip) = name.parse::<IpAddr>() {
                return vec![SocketAddr::new(ip, DNS_PORT)];
            }
            match self
                .query_with_timeout(self.upstream, name, RecordType::A)
                .await
            {
                Ok(addrs) => addrs
                    .iter()
                    .filter_map(|addr| addr.parse::<IpAddr>().ok())
                    .map(|ip| SocketAddr::new(ip, DNS_PORT))
                    .collect(),
                Err(err) => {
                    warn!(nameserver = %name, "address lookup failed: {err}");
                    Vec::new()
                }
            }
        });
        let hosts: BTreeSet<SocketAddr> = join_all(lookups).await.into_iter().flatten().collect();
        hosts.into_iter().collect()
    }

    /// Poll every host until each returns exactly the `expected` values for `name`, or until
    /// `max_wait` has elapsed.
    ///
    /// Hosts are polled independently. A host that never answers just stays unconverged. Query
    /// failures are logged and retried at the next interval; only the deadline ends polling,
    /// and reaching it cancels every in-flight query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAuthoritativeNameservers`] if `hosts` is empty, and
    /// [`Error::TimeoutExceeded`] if the deadline passes before every host converged.
    pub async fn verify(
        &self,
        hosts: &[SocketAddr],
        record_type: RecordType,
        name: &str,
        expected: &BTreeSet<String>,
        max_wait: Duration,
    ) -> Result<(), Error> {
        if hosts.is_empty() {
            return Err(Error::NoAuthoritativeNameservers(name.to_string()));
        }
        let deadline = Instant::now() + max_wait;
        info!(
            %name,
            %record_type,
            hosts = hosts.len(),
            max_wait_secs = max_wait.as_secs(),
            "waiting for propagation"
        );

        let polls = hosts
            .iter()
            .map(|host| self.poll_host(*host, record_type, name, expected));
        match timeout_at(deadline, join_all(polls)).await {
            Ok(_) => {
                info!(%name, "propagated to all authoritative nameservers");
                Ok(())
            }
            Err(_) => Err(Error::TimeoutExceeded {
                name: name.to_string(),
                waited: max_wait,
            }),
        }
    }

    async fn poll_host(
        &self,
        host: SocketAddr,
        record_type: RecordType,
        name: &str,
        expected: &BTreeSet<String>,
    ) {
        loop {
            match self.query_with_timeout(host, name, record_type).await {
                Ok(values) if converged(&values, expected) => {
                    debug!(%host, %name, "nameserver converged");
                    return;
                }
                Ok(values) => trace!(%host, %name, ?values, "not yet converged"),
                Err(err) => warn!(%host, %name, "propagation query failed: {err}"),
            }
            sleep(self.settings.poll_interval).await;
        }
    }

    async fn query_with_timeout(
        &self,
        server: SocketAddr,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<String>, Error> {
        match timeout(
            self.settings.query_timeout,
            self.resolver.query(server, name, record_type),
        )
        .await
        {
            Ok(res) => res,
            Err(_) => Err(Error::TimeoutExceeded {
                name: name.to_string(),
                waited: self.settings.query_timeout,
            }),
        }
    }
}

/// A host has converged once every value it returns is expected and none is missing.
fn converged(values: &[String], expected: &BTreeSet<String>) -> bool {
    !values.is_empty() && values.iter().cloned().collect::<BTreeSet<_>>() == *expected
}
