use crate::dns::PropagationSettings;
use crate::error::Error;
use crate::provider::AdapterSettings;
use crate::zone_client::ProviderConfig;
use ipnetwork::IpNetwork;
use lazy_static::lazy_static;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_client::rr::{LowerName, Name};

pub type SharedConfig = Arc<Config>;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Names the certificate covers, e.g. `example.com` and `*.example.com`.
    pub domains: Vec<String>,
    /// Days before expiry a certificate is considered due. Renewal starts at twice this.
    #[serde(default = "default_expiry_threshold")]
    pub expiry_threshold: u64,
    #[serde(default)]
    pub certificate_status_path: Option<PathBuf>,
    pub api_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub api_timeout: Duration,
    #[serde(default)]
    pub acl: HashMap<IpNetwork, HashSet<LowerName>>,
    pub dns: DnsConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DnsConfig {
    pub provider: ProviderConfig,
    /// Point the A/AAAA records of every domain at the addresses below.
    #[serde(default)]
    pub set_ip: bool,
    #[serde(default)]
    pub ip4_list: Vec<Ipv4Addr>,
    #[serde(default)]
    pub ip6_list: Vec<Ipv6Addr>,
    #[serde(default = "default_ttl")]
    pub challenge_ttl: u32,
    #[serde(default = "default_ttl")]
    pub address_ttl: u32,
}

#[serde_as]
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PropagationConfig {
    /// Recursive resolver used to find a zone's authoritative nameservers.
    #[serde(default = "default_resolver_addr")]
    pub resolver_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_max_wait")]
    pub max_wait: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_query_timeout")]
    pub query_timeout: Duration,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        PropagationConfig {
            resolver_addr: default_resolver_addr(),
            max_wait: default_max_wait(),
            poll_interval: default_poll_interval(),
            query_timeout: default_query_timeout(),
        }
    }
}

fn default_expiry_threshold() -> u64 {
    5
}

fn default_ttl() -> u32 {
    600
}

fn default_resolver_addr() -> SocketAddr {
    SocketAddr::from(([1, 1, 1, 1], 53))
}

fn default_max_wait() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_query_timeout() -> Duration {
    Duration::from_secs(3)
}

lazy_static! {
    // NOTE(XXX): Once the "ip" feature has stabilized we can use Ipv6Addr.is_unique_local[0].
    //            Presently this feature is unstable so we home-roll. See also RFC 4193[1].
    // [0]: https://doc.rust-lang.org/std/net/struct.Ipv6Addr.html#method.is_unique_local
    // [1]: https://www.rfc-editor.org/rfc/rfc4193.html
    static ref IPV6_UNIQUE_LOCAL_NETWORK: IpNetwork = IpNetwork::from_str("fc00::/7").unwrap();
}

impl Config {
    /// Load and validate the JSON configuration at `p`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] or [`Error::InvalidJSON`] for an unreadable file,
    /// [`Error::InsecureAPIBind`] for a public API bind address and [`Error::InvalidConfig`]
    /// when any other field is out of range.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.validate()?;
        Ok(conf)
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        self.bind_addr_is_secure()?;

        if self.domains.is_empty() {
            return Err(Error::InvalidConfig("no domains configured".to_string()));
        }
        if let Some(domain) = self.domains.iter().find(|d| !valid_domain(d)) {
            return Err(Error::InvalidConfig(format!(
                "\"{domain}\" is not a valid domain"
            )));
        }
        if !(5..=30).contains(&self.expiry_threshold) {
            return Err(Error::InvalidConfig(format!(
                "expiry_threshold must be between 5 and 30 days, found {}",
                self.expiry_threshold
            )));
        }
        if self.api_timeout <= self.propagation.max_wait {
            return Err(Error::InvalidConfig(format!(
                "api_timeout ({}s) must exceed propagation.max_wait ({}s)",
                self.api_timeout.as_secs(),
                self.propagation.max_wait.as_secs()
            )));
        }
        if self.propagation.poll_interval.is_zero() || self.propagation.query_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "propagation intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn update_permitted(&self, source_ip: IpAddr, domain: &Name) -> bool {
        let domain = LowerName::from(domain);
        self.acl.iter().any(|(allowed_network, allowed_domains)| {
            allowed_network.contains(source_ip) && allowed_domains.contains(&domain)
        })
    }

    /// How long before expiry a held certificate gets renewed.
    #[must_use]
    pub fn renew_within(&self) -> Duration {
        Duration::from_secs(2 * self.expiry_threshold * SECONDS_PER_DAY)
    }

    #[must_use]
    pub fn adapter_settings(&self) -> AdapterSettings {
        AdapterSettings {
            challenge_ttl: self.dns.challenge_ttl,
            address_ttl: self.dns.address_ttl,
            max_wait: self.propagation.max_wait,
            ..AdapterSettings::default()
        }
    }

    #[must_use]
    pub fn propagation_settings(&self) -> PropagationSettings {
        PropagationSettings {
            poll_interval: self.propagation.poll_interval,
            query_timeout: self.propagation.query_timeout,
        }
    }

    fn bind_addr_is_secure(&self) -> Result<(), Error> {
        match self.api_bind_addr {
            SocketAddr::V4(v4_addr) => {
                let ip = v4_addr.ip();
                if !ip.is_loopback() && !ip.is_private() {
                    return Err(Error::InsecureAPIBind(IpAddr::V4(*ip)));
                }
                Ok(())
            }
            SocketAddr::V6(v6_addr) => {
                let ip = v6_addr.ip();
                if !ip.is_loopback() && !IPV6_UNIQUE_LOCAL_NETWORK.contains(IpAddr::V6(*ip)) {
                    return Err(Error::InsecureAPIBind(IpAddr::V6(*ip)));
                }
                Ok(())
            }
        }
    }
}

/// A hostname of at least two labels, optionally prefixed by a `*.` wildcard label.
fn valid_domain(domain: &str) -> bool {
    let host = domain.strip_prefix("*.").unwrap_or(domain);
    let host = host.strip_suffix('.').unwrap_or(host);
    let labels: Vec<&str> = host.split('.').collect();
    labels.len() >= 2
        && host.len() <= 253
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> serde_json::Value {
        json!({
            "domains": ["example.com", "*.example.com"],
            "api_bind_addr": "127.0.0.1:8053",
            "api_timeout": 700,
            "acl": { "10.0.0.0/24": ["example.com", "*.example.com"] },
            "dns": {
                "provider": { "plugin": "memory", "config": { "zones": ["example.com"] } }
            }
        })
    }

    fn parse(value: serde_json::Value) -> Result<Config, Error> {
        let config: Config = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_defaults() {
        let config = parse(base()).unwrap();
        assert_eq!(config.expiry_threshold, 5);
        assert_eq!(config.propagation, PropagationConfig::default());
        assert_eq!(config.dns.challenge_ttl, 600);
        assert!(!config.dns.set_ip);
        assert_eq!(config.renew_within(), Duration::from_secs(10 * SECONDS_PER_DAY));

        let settings = config.adapter_settings();
        assert_eq!(settings.max_wait, Duration::from_secs(600));
        assert_eq!(settings.read_attempts, 3);
        assert_eq!(
            config.propagation_settings(),
            PropagationSettings::default()
        );
    }

    #[test]
    fn test_update_permitted() {
        let config = parse(base()).unwrap();
        let inside: IpAddr = "10.0.0.7".parse().unwrap();
        let outside: IpAddr = "10.0.1.7".parse().unwrap();

        assert!(config.update_permitted(inside, &Name::from_str("EXAMPLE.com").unwrap()));
        assert!(config.update_permitted(inside, &Name::from_str("*.example.com").unwrap()));
        assert!(!config.update_permitted(inside, &Name::from_str("www.example.com").unwrap()));
        assert!(!config.update_permitted(outside, &Name::from_str("example.com").unwrap()));
    }

    #[test]
    fn test_insecure_bind() {
        let mut value = base();
        value["api_bind_addr"] = json!("203.0.113.1:8053");
        assert!(matches!(parse(value), Err(Error::InsecureAPIBind(_))));

        let mut value = base();
        value["api_bind_addr"] = json!("[fd00::1]:8053");
        assert!(parse(value).is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            ("domains", json!([])),
            ("domains", json!(["localhost"])),
            ("domains", json!(["-bad.example.com"])),
            ("expiry_threshold", json!(4)),
            ("expiry_threshold", json!(31)),
            ("api_timeout", json!(600)),
        ];
        for (field, bad) in cases {
            let mut value = base();
            value[field] = bad.clone();
            assert!(
                matches!(parse(value), Err(Error::InvalidConfig(_))),
                "{field} = {bad} accepted"
            );
        }
    }

    #[test]
    fn test_unknown_provider() {
        let mut value = base();
        value["dns"]["provider"] = json!({ "plugin": "godaddy", "config": {} });
        assert!(matches!(parse(value), Err(Error::InvalidJSON(_))));
    }

    #[test]
    fn test_try_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, base().to_string()).unwrap();
        let config = Config::try_from_file(&path).unwrap();
        assert_eq!(config.domains.len(), 2);

        assert!(matches!(
            Config::try_from_file(dir.path().join("missing.json")),
            Err(Error::IO(_))
        ));
    }

    #[test]
    fn test_valid_domain() {
        assert!(valid_domain("example.com"));
        assert!(valid_domain("*.example.com"));
        assert!(valid_domain("a-b.example.co.uk."));
        assert!(!valid_domain("*.com.*"));
        assert!(!valid_domain("exa mple.com"));
        assert!(!valid_domain("example..com"));
    }
}
