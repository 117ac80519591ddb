//! Propagation checks against in-process authoritative nameservers.

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::client::op::{Header, ResponseCode};
use trust_dns_server::client::rr::rdata::TXT;
use trust_dns_server::client::rr::{LowerName, Name, RData, Record, RecordType};
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use trust_dns_server::ServerFuture;
use wildcrab::dns::{PropagationSettings, PropagationVerifier, Resolver, TrustDnsResolver};
use wildcrab::error::Error;

const CHALLENGE: &str = "_acme-challenge.example.com";

type Zone = Arc<RwLock<HashMap<LowerName, Vec<String>>>>;

/// Answers TXT queries from `zone`, with an empty answer for unknown names.
#[derive(Clone)]
struct TxtHandler {
    zone: Zone,
}

#[async_trait::async_trait]
impl RequestHandler for TxtHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let builder = MessageResponseBuilder::from_message_request(request);
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);

        let query = request.query();
        let records: Vec<Record> = if query.query_type() == RecordType::TXT {
            let zone = self.zone.read().await;
            zone.get(query.name())
                .map(|values| {
                    values
                        .iter()
                        .map(|value| {
                            Record::from_rdata(
                                query.name().into(),
                                1,
                                RData::TXT(TXT::new(vec![value.clone()])),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let response = builder.build(header, records.iter(), &[], &[], &[]);
        match response_handle.send_response(response).await {
            Ok(info) => info,
            Err(_) => {
                let mut header = Header::new();
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}

async fn nameserver() -> (SocketAddr, Zone) {
    let zone: Zone = Arc::default();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let mut server = ServerFuture::new(TxtHandler { zone: zone.clone() });
    server.register_socket(socket);
    tokio::spawn(server.block_until_done());
    (addr, zone)
}

fn challenge_name() -> LowerName {
    Name::from_str(&format!("{CHALLENGE}.")).unwrap().into()
}

async fn set_txt(zone: &Zone, values: &[&str]) {
    zone.write().await.insert(
        challenge_name(),
        values.iter().map(ToString::to_string).collect(),
    );
}

fn resolver() -> TrustDnsResolver {
    TrustDnsResolver::new(Duration::from_secs(1))
}

fn verifier() -> PropagationVerifier {
    PropagationVerifier::new(
        Arc::new(resolver()),
        // Discovery isn't exercised here.
        "127.0.0.1:9".parse().unwrap(),
        PropagationSettings {
            poll_interval: Duration::from_millis(100),
            query_timeout: Duration::from_secs(1),
        },
    )
}

fn expected(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn test_query_txt() {
    let (addr, zone) = nameserver().await;
    set_txt(&zone, &["first", "second"]).await;

    let mut answers = resolver()
        .query(addr, CHALLENGE, RecordType::TXT)
        .await
        .unwrap();
    answers.sort();
    assert_eq!(answers, vec!["first".to_string(), "second".to_string()]);

    let answers = resolver()
        .query(addr, "_acme-challenge.example.org", RecordType::TXT)
        .await
        .unwrap();
    assert!(answers.is_empty());
}

#[tokio::test]
async fn test_verify_waits_for_slowest_nameserver() {
    let (fast_addr, fast_zone) = nameserver().await;
    let (slow_addr, slow_zone) = nameserver().await;
    set_txt(&fast_zone, &["token"]).await;
    set_txt(&slow_zone, &["stale"]).await;

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        set_txt(&slow_zone, &["token"]).await;
    });

    verifier()
        .verify(
            &[fast_addr, slow_addr],
            RecordType::TXT,
            CHALLENGE,
            &expected(&["token"]),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_verify_times_out() {
    let (addr, zone) = nameserver().await;
    set_txt(&zone, &["token", "stale"]).await;

    let res = verifier()
        .verify(
            &[addr],
            RecordType::TXT,
            CHALLENGE,
            &expected(&["token"]),
            Duration::from_millis(500),
        )
        .await;
    assert!(matches!(res, Err(Error::TimeoutExceeded { .. })));
}
