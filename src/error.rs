//! Error types.

use axum::extract::rejection::JsonRejection;
use std::net::IpAddr;
use std::time::Duration;
use trust_dns_client::error::ClientError;
use trust_dns_client::rr::LowerName;
use trust_dns_proto::error::ProtoError;

/// Error enumerates the possible wildcrab error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a requested domain is not the apex of, or a name below, any zone owned by
    /// the configured provider account. Fatal for that domain only.
    #[error("no owned zone found for \"{0}\"")]
    ZoneNotFound(String),

    /// Returned when a [`ZoneManagementClient`][crate::zone_client::ZoneManagementClient] call
    /// fails. Reads are retried by the [provider adapter][crate::provider] before this surfaces,
    /// writes are surfaced immediately.
    #[error("provider request failed: {0}")]
    ProviderTransport(String),

    /// Returned when the provider account reports no zones at all.
    #[error("the provider account owns no zones")]
    NoOwnedZones,

    /// Returned when a record did not reach every authoritative nameserver before the
    /// propagation deadline.
    #[error("{name} did not propagate within {}s", waited.as_secs())]
    TimeoutExceeded { name: String, waited: Duration },

    /// Returned when neither DNS delegation nor the provider could name an authoritative
    /// nameserver to verify propagation against.
    #[error("no authoritative nameservers found for \"{0}\"")]
    NoAuthoritativeNameservers(String),

    /// Returned when address maintenance is asked to manage anything other than `A` or `AAAA`
    /// records.
    #[error("{0} records can't be managed as addresses")]
    UnsupportedRecordType(String),

    /// Returned when address maintenance is given a value that isn't an address of the
    /// record's family.
    #[error("\"{value}\" is not a valid {record_type} record value")]
    InvalidRecordValue { record_type: String, value: String },

    /// Returned when clients `POST` the [hook API][crate::api] from a source IP address that
    /// isn't in a [`Config::acl`][`crate::config::Config::acl`] network, or when the request
    /// names a domain that isn't listed for the client's network.
    #[error("IP {0} is not authorized to manage \"{1}\"")]
    AuthForbidden(IpAddr, LowerName),

    /// Returned when clients `POST` invalid JSON.
    #[error(transparent)]
    JsonExtractorRejection(#[from] JsonRejection),

    /// Returned when clients `POST` the [`/present` endpoint][crate::api#present-post] with a
    /// `txt` value that isn't a valid [RFC-8555][RFC-8555] [DNS-01] challenge response value.
    ///
    /// These values MUST be a BASE64 encoded 32 byte SHA256 digest.
    ///
    /// [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
    /// [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
    #[error("TXT value is not a valid DNS-01 challenge response")]
    InvalidDNS01,

    /// Returned when the [`Config::api_bind_addr`][`crate::config::Config::api_bind_addr`] is
    /// not a loopback address, or an address within a private network space.
    #[error("API bind address ({0}) must be a loopback or private IP")]
    InsecureAPIBind(IpAddr),

    /// Returned when a loaded [`Config`][crate::config::Config] fails validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when processing JSON from disk (e.g. the configuration, the file provider's zone
    /// database or a certificate status file) fails due to invalid JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),

    /// Returned when a name can't be encoded, or a DNS message can't be exchanged.
    #[error("DNS error")]
    DNSError(#[from] ProtoError),

    /// Returned when a DNS query to a specific nameserver fails.
    #[error("DNS query failed")]
    DNSClientError(#[from] ClientError),
}
