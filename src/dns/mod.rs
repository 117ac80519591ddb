//! DNS queries against authoritative nameservers.
//!
//! # Propagation
//!
//! Provider APIs accept a record long before every authoritative nameserver of the zone serves
//! it. An ACME server validating a [DNS-01] challenge too early sees a missing or stale TXT
//! record and fails the authorization, so wildcrab only signals readiness once each
//! authoritative nameserver answers with exactly the expected values.
//!
//! The nameservers are found by walking the requested domain up towards its registrable parent
//! and asking the configured upstream resolver for NS records at each level:
//!
//! ```bash
//! ❯ dig @1.1.1.1 +short www.example.com NS
//! ❯ dig @1.1.1.1 +short example.com NS
//! ns1.example.net.
//! ns2.example.net.
//! ```
//!
//! Each of those is then polled directly, bypassing resolver caches:
//!
//! ```bash
//! ❯ dig @198.51.100.1 +short _acme-challenge.www.example.com TXT
//! "LPsIwTo7o8BoG0-vjCyGQGBWSVIPxI-i_X336eUOQZo"
//! ```
//!
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4

pub mod propagation;
pub mod resolver;

pub use propagation::{PropagationSettings, PropagationVerifier};
pub use resolver::{DynResolver, Resolver, TrustDnsResolver};
