//! Deciding whether a held certificate must be renewed.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

/// What the certificate authority client reports about the certificate currently held for a
/// domain set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateStatus {
    pub alt_names: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// An async trait describing the certificate authority client's view of held certificates.
#[async_trait::async_trait]
pub trait CertificateAuthority {
    /// Status of the certificate held for `domains`, or `None` before the first issuance.
    async fn status(&self, domains: &[String]) -> Result<Option<CertificateStatus>, Error>;
}

/// Decide against the current time. See [`should_renew_at`].
#[must_use]
pub fn should_renew(
    status: Option<&CertificateStatus>,
    requested_domains: &[String],
    renew_within: Duration,
) -> bool {
    should_renew_at(
        status,
        requested_domains,
        renew_within,
        OffsetDateTime::now_utc(),
    )
}

/// Renew when nothing was issued yet, when the requested domain set differs from the
/// certificate's alternative names, or once `now` is inside the `renew_within` window before
/// expiry.
#[must_use]
pub fn should_renew_at(
    status: Option<&CertificateStatus>,
    requested_domains: &[String],
    renew_within: Duration,
    now: OffsetDateTime,
) -> bool {
    let Some(status) = status else {
        info!("no certificate held yet, requesting one");
        return true;
    };

    let held = name_set(&status.alt_names);
    let requested = name_set(requested_domains);
    if held != requested {
        info!(
            have = ?sorted(&held),
            requesting = ?sorted(&requested),
            "certificate domains changed, requesting a new certificate"
        );
        return true;
    }

    // A window reaching past the representable range starts before any `now`.
    let renew_from = time::Duration::try_from(renew_within)
        .ok()
        .and_then(|window| status.expires_at.checked_sub(window))
        .filter(|renew_from| *renew_from > now);
    let Some(renew_from) = renew_from else {
        info!(
            expires_at = %format_timestamp(status.expires_at),
            "certificate is inside its renewal window"
        );
        return true;
    };

    info!(
        expires_at = %format_timestamp(status.expires_at),
        due_in_days = (renew_from - now).whole_days(),
        "certificate not due for renewal"
    );
    false
}

fn name_set(names: &[String]) -> HashSet<String> {
    names
        .iter()
        .map(|name| name.trim_end_matches('.').to_ascii_lowercase())
        .collect()
}

fn sorted(names: &HashSet<String>) -> Vec<&String> {
    let mut names: Vec<&String> = names.iter().collect();
    names.sort();
    names
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

/// A [`CertificateAuthority`] reading the status the ACME client last recorded as JSON:
///
/// ```json
/// { "alt_names": ["example.com", "*.example.com"], "expires_at": "2024-06-01T00:00:00Z" }
/// ```
///
/// A missing file means no certificate has been issued yet.
#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StatusFile { path: path.into() }
    }
}

#[async_trait::async_trait]
impl CertificateAuthority for StatusFile {
    async fn status(&self, _domains: &[String]) -> Result<Option<CertificateStatus>, Error> {
        match tokio::fs::read(&self.path).await {
            Ok(contents) => Ok(Some(serde_json::from_slice(&contents)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::IO(err)),
        }
    }
}
