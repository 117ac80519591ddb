use crate::error::Error;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use trust_dns_client::client::{AsyncClient, ClientHandle};
use trust_dns_client::rr::{DNSClass, Name, RData, RecordType};
use trust_dns_client::udp::UdpClientStream;

/// `DynResolver` is a type alias for a [`Resolver`] shared between concurrent propagation
/// checks.
#[allow(clippy::module_name_repetitions)]
pub type DynResolver = Arc<dyn Resolver + Send + Sync>;

/// An async trait describing a DNS query against one specific nameserver, bypassing any
/// recursive resolver caches.
#[async_trait::async_trait]
pub trait Resolver {
    /// Query `server` for `record_type` records at `name`, returning each answer's value in
    /// presentation form. TXT character strings are joined, names are fully qualified.
    async fn query(
        &self,
        server: SocketAddr,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<String>, Error>;
}

/// A [`Resolver`] sending single UDP queries with the `trust-dns` client.
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct TrustDnsResolver {
    timeout: Duration,
}

impl TrustDnsResolver {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        TrustDnsResolver { timeout }
    }
}

#[async_trait::async_trait]
impl Resolver for TrustDnsResolver {
    async fn query(
        &self,
        server: SocketAddr,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<String>, Error> {
        let name = Name::from_str(&format!("{}.", name.trim_end_matches('.')))?;
        let stream = UdpClientStream::<UdpSocket>::with_timeout(server, self.timeout);
        let (mut client, background) = AsyncClient::connect(stream).await?;
        let background = tokio::spawn(background);

        let response = client.query(name, DNSClass::IN, record_type).await;
        background.abort();

        Ok(response?
            .answers()
            .iter()
            .filter(|record| record.record_type() == record_type)
            .filter_map(|record| record.data())
            .filter_map(rdata_value)
            .collect())
    }
}

fn rdata_value(rdata: &RData) -> Option<String> {
    match rdata {
        RData::A(ip) => Some(ip.to_string()),
        RData::AAAA(ip) => Some(ip.to_string()),
        RData::TXT(txt) => Some(
            txt.txt_data()
                .iter()
                .map(|data| String::from_utf8_lossy(data))
                .collect(),
        ),
        RData::NS(name) | RData::CNAME(name) => Some(name.to_utf8()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use trust_dns_client::rr::rdata::TXT;

    #[test]
    fn test_rdata_value() {
        assert_eq!(
            rdata_value(&RData::A(Ipv4Addr::new(192, 0, 2, 1))),
            Some("192.0.2.1".to_string())
        );
        assert_eq!(
            rdata_value(&RData::AAAA(Ipv6Addr::LOCALHOST)),
            Some("::1".to_string())
        );
        assert_eq!(
            rdata_value(&RData::TXT(TXT::new(vec![
                "split-".to_string(),
                "token".to_string()
            ]))),
            Some("split-token".to_string())
        );
        assert_eq!(
            rdata_value(&RData::NS(Name::from_str("ns1.example.net.").unwrap())),
            Some("ns1.example.net.".to_string())
        );
    }
}
