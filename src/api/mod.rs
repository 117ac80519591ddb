//! HTTP hook API through which an external ACME client drives DNS-01 challenges.
//!
//! # API Endpoints
//!
//! ## `/healthcheck` (GET)
//!   
//!   Returns HTTP 200 (OK) and the JSON body `{"ok":"healthy"}` when the service is operational.
//!
//! ## `/present` (POST)
//!
//!   Expects a JSON request body of the form:
//!
//!   ```json
//!   { "domain": "*.example.com", "txt": "XXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX" }
//!   ```
//!  
//!  Where `domain` is a name the certificate covers, listed in the configuration ACL for a
//!  network containing the client's source IP address.
//!
//!  The `txt` value must be a valid [RFC-8555][RFC-8555] [DNS-01] challenge response. It is
//!  added to the TXT values of the domain's challenge record, keeping any token presented
//!  earlier for a name sharing that record (`example.com` and `*.example.com`). The response is
//!  held until every authoritative nameserver of the zone serves the whole set, so the client
//!  can ask the CA for validation straight away.
//!  
//!  For successful requests, returns HTTP 200 (OK) and a JSON response body of the form:
//!
//!  ```json
//!  { "txt": "XXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX", "challenge_path": "_acme-challenge" }
//!  ```
//!  In the response, `txt` contains the echoed `txt` value from the client request and
//!  `challenge_path` the challenge record's name relative to its zone.
//!
//!  A record that didn't propagate before `propagation.max_wait` elapsed yields HTTP 504.
//!
//! ## `/cleanup` (POST)
//!
//!   Expects `{ "domain": "*.example.com", "txt": "XXXX..." }`, with the same ACL check as
//!   `/present`. Removes only that TXT value from the domain's challenge record and returns
//!   `{"ok":"removed"}`.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4

mod api_error;
mod model;
mod routes;
pub mod server;

pub use server::new;
