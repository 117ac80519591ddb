//! Mapping requested domains onto the zones a provider account owns.
//!
//! A [`ZoneMap`] is keyed by the reversed-label form of each owned zone (`com.example` for
//! `example.com`), so a requested domain can be matched one whole label at a time starting from
//! its TLD. Matching on whole labels means `myexample.com` never resolves into `example.com`.

use crate::error::Error;
use std::collections::HashMap;

/// Record name prefix an [RFC-8555][RFC-8555] [DNS-01] challenge must be written under.
///
/// [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
/// [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
pub const ACME_CHALLENGE_PREFIX: &str = "_acme-challenge";

/// Owned zones keyed by their reversed-label form. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneMap {
    zones: HashMap<String, String>,
}

/// Where a requested domain lives: the owned zone, the label within it, and the record name
/// its DNS-01 challenge must occupy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub zone: String,
    /// Label relative to `zone` with any wildcard marker stripped. Empty at the apex.
    pub label: String,
    pub is_apex: bool,
    pub is_wildcard: bool,
    /// Challenge record name relative to `zone`.
    pub challenge_path: String,
}

impl ZoneMap {
    pub fn new<I, S>(zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let zones = zones
            .into_iter()
            .map(|zone| zone.as_ref().trim().to_string())
            .filter(|zone| !normalize(zone).is_empty())
            .map(|zone| (reverse_labels(&normalize(&zone)), zone))
            .collect();
        ZoneMap { zones }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Resolve `requested` against the owned zones.
    ///
    /// The candidate key grows one label at a time from the TLD and the first owned zone it
    /// reaches wins. When owned zones are nested (`example.com` and `sub.example.com`),
    /// `a.sub.example.com` therefore resolves to `example.com` with the label `a.sub`.
    ///
    /// The returned zone keeps the provider's own spelling, labels are lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZoneNotFound`] when no owned zone is a suffix of `requested`.
    pub fn resolve(&self, requested: &str) -> Result<ResolvedTarget, Error> {
        let domain = normalize(requested);
        let mut candidate = String::with_capacity(domain.len());
        let mut owned = None;
        for label in domain.rsplit('.') {
            if !candidate.is_empty() {
                candidate.push('.');
            }
            candidate.push_str(label);
            if let Some(zone) = self.zones.get(&candidate) {
                owned = Some(zone);
                break;
            }
        }

        let zone = owned.ok_or_else(|| Error::ZoneNotFound(requested.to_string()))?;
        let zone_len = candidate.len();
        let label = if domain.len() == zone_len {
            ""
        } else {
            &domain[..domain.len() - zone_len - 1]
        };

        let (label, is_wildcard) = match label.strip_prefix('*') {
            Some(rest) => (rest.strip_prefix('.').unwrap_or(rest), true),
            None => (label, false),
        };
        let is_apex = label.is_empty();
        let challenge_path = if is_apex {
            ACME_CHALLENGE_PREFIX.to_string()
        } else {
            format!("{ACME_CHALLENGE_PREFIX}.{label}")
        };

        Ok(ResolvedTarget {
            zone: zone.clone(),
            label: label.to_string(),
            is_apex,
            is_wildcard,
            challenge_path,
        })
    }
}

impl ResolvedTarget {
    /// Fully qualified challenge record name, e.g. `_acme-challenge.www.example.com`.
    #[must_use]
    pub fn challenge_fqdn(&self) -> String {
        format!("{}.{}", self.challenge_path, self.zone)
    }

    /// Owner name for address records relative to the zone. Wildcards keep their `*` label.
    #[must_use]
    pub fn record_name(&self) -> String {
        match (self.is_wildcard, self.is_apex) {
            (true, true) => "*".to_string(),
            (true, false) => format!("*.{}", self.label),
            (false, _) => self.label.clone(),
        }
    }

    /// The resolved domain without its wildcard marker.
    #[must_use]
    pub fn fqdn(&self) -> String {
        if self.is_apex {
            self.zone.clone()
        } else {
            format!("{}.{}", self.label, self.zone)
        }
    }
}

/// Reverse the label order of a domain: `www.example.com` becomes `com.example.www`.
#[must_use]
pub fn reverse_labels(domain: &str) -> String {
    domain.rsplit('.').collect::<Vec<_>>().join(".")
}

fn normalize(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_zones() -> ZoneMap {
        ZoneMap::new(["example.com"])
    }

    #[test]
    fn test_keys_are_reversed_labels() {
        let zones = ZoneMap::new(["example.com", "Example.ORG."]);
        assert_eq!(zones.len(), 2);
        assert_eq!(
            zones.zones.get("com.example").map(String::as_str),
            Some("example.com")
        );
        assert_eq!(
            zones.zones.get("org.example").map(String::as_str),
            Some("Example.ORG.")
        );
    }

    #[test]
    fn test_resolve_keeps_provider_zone_spelling() {
        let zones = ZoneMap::new(["Example.com"]);
        let target = zones.resolve("WWW.example.COM").unwrap();
        assert_eq!(target.zone, "Example.com");
        assert_eq!(target.label, "www");
        assert_eq!(target.challenge_fqdn(), "_acme-challenge.www.Example.com");

        let apex = zones.resolve("example.com").unwrap();
        assert_eq!(apex.zone, "Example.com");
        assert!(apex.is_apex);
    }

    #[test]
    fn test_resolve_subdomain() {
        let target = example_zones().resolve("www.example.com").unwrap();
        assert_eq!(
            target,
            ResolvedTarget {
                zone: "example.com".to_string(),
                label: "www".to_string(),
                is_apex: false,
                is_wildcard: false,
                challenge_path: "_acme-challenge.www".to_string(),
            }
        );
        assert_eq!(target.challenge_fqdn(), "_acme-challenge.www.example.com");
        assert_eq!(target.fqdn(), "www.example.com");
    }

    #[test]
    fn test_resolve_deep_label() {
        let target = example_zones().resolve("a.b.example.com").unwrap();
        assert_eq!(target.label, "a.b");
        assert_eq!(target.challenge_path, "_acme-challenge.a.b");
    }

    #[test]
    fn test_resolve_apex() {
        let target = example_zones().resolve("example.com").unwrap();
        assert_eq!(target.zone, "example.com");
        assert_eq!(target.label, "");
        assert!(target.is_apex);
        assert!(!target.is_wildcard);
        assert_eq!(target.challenge_path, "_acme-challenge");
        assert_eq!(target.record_name(), "");
    }

    #[test]
    fn test_resolve_wildcard_apex() {
        let target = example_zones().resolve("*.example.com").unwrap();
        assert!(target.is_wildcard);
        assert!(target.is_apex);
        assert_eq!(target.label, "");
        assert_eq!(target.challenge_path, "_acme-challenge");
        assert_eq!(target.record_name(), "*");
    }

    #[test]
    fn test_resolve_wildcard_label() {
        let target = example_zones().resolve("*.dev.example.com").unwrap();
        assert!(target.is_wildcard);
        assert!(!target.is_apex);
        assert_eq!(target.label, "dev");
        assert_eq!(target.challenge_path, "_acme-challenge.dev");
        assert_eq!(target.record_name(), "*.dev");
        assert_eq!(target.fqdn(), "dev.example.com");
    }

    #[test]
    fn test_resolve_normalizes_case_and_root_dot() {
        let target = example_zones().resolve("WWW.Example.com.").unwrap();
        assert_eq!(target.zone, "example.com");
        assert_eq!(target.label, "www");
    }

    #[test]
    fn test_resolve_not_found() {
        let zones = example_zones();
        assert!(matches!(
            zones.resolve("www.example.org"),
            Err(Error::ZoneNotFound(d)) if d == "www.example.org"
        ));
        assert!(matches!(zones.resolve("com"), Err(Error::ZoneNotFound(_))));
        assert!(matches!(zones.resolve(""), Err(Error::ZoneNotFound(_))));
    }

    #[test]
    fn test_resolve_matches_whole_labels_only() {
        let zones = example_zones();
        assert!(matches!(
            zones.resolve("myexample.com"),
            Err(Error::ZoneNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_takes_first_zone_from_the_right() {
        let zones = ZoneMap::new(["sub.example.com", "example.com"]);
        let target = zones.resolve("a.sub.example.com").unwrap();
        assert_eq!(target.zone, "example.com");
        assert_eq!(target.label, "a.sub");
        assert_eq!(target.challenge_path, "_acme-challenge.a.sub");

        let target = zones.resolve("sub.example.com").unwrap();
        assert_eq!(target.zone, "example.com");
        assert_eq!(target.label, "sub");

        let target = zones.resolve("b.example.com").unwrap();
        assert_eq!(target.zone, "example.com");
        assert_eq!(target.label, "b");
    }

    #[test]
    fn test_resolve_label_for_every_owned_zone() {
        let zones = ZoneMap::new(["example.com", "example.co.uk", "internal"]);
        for (zone, label) in [
            ("example.com", "api"),
            ("example.co.uk", "mail.eu"),
            ("internal", "db"),
        ] {
            let target = zones.resolve(&format!("{label}.{zone}")).unwrap();
            assert_eq!(target.zone, zone);
            assert_eq!(target.label, label);

            let wildcard = zones.resolve(&format!("*.{label}.{zone}")).unwrap();
            assert!(wildcard.is_wildcard);
            assert_eq!(wildcard.label, label);
        }
    }

    #[test]
    fn test_reverse_labels() {
        assert_eq!(reverse_labels("www.example.com"), "com.example.www");
        assert_eq!(reverse_labels("com"), "com");
    }
}
