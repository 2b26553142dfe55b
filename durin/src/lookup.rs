//! Domain lookup service.
//!
//! The service answers `GET /api/get-domains?address=<addr>&network=<Mainnet|Sepolia>`
//! with an ordered JSON array of names (entries may be `null`), `400` for a
//! missing or malformed address and `500` when the subgraph lookup fails.

use std::future::Future;
use std::time::Duration;

use alloy::primitives::Address;

use crate::error::LookupError;
use crate::types::{Domain, L1Network};

/// Per-request timeout for lookup calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of the ENS names associated with an address.
pub trait DomainLookup: Send + Sync {
    /// Fetch the names `address` owns or controls on `network`.
    fn domains_for(
        &self,
        address: Address,
        network: L1Network,
    ) -> impl Future<Output = Result<Vec<Domain>, LookupError>> + Send;
}

/// [`DomainLookup`] over the HTTP lookup endpoint.
#[derive(Debug, Clone)]
pub struct HttpDomainLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDomainLookup {
    /// Create a client for the service rooted at `base_url`, bounded by
    /// [`REQUEST_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, LookupError> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    /// Create a client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Http`] if the HTTP client cannot be built.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing `reqwest` client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    /// Full endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/api/get-domains", self.base_url)
    }
}

impl DomainLookup for HttpDomainLookup {
    async fn domains_for(
        &self,
        address: Address,
        network: L1Network,
    ) -> Result<Vec<Domain>, LookupError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("address", address.to_string()),
                ("network", network.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status == reqwest::StatusCode::BAD_REQUEST {
            return Err(LookupError::InvalidAddress(body));
        }
        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_domains(&body)
    }
}

/// Decode a lookup response body, dropping `null` entries.
///
/// # Errors
///
/// Returns [`LookupError::Decode`] if the body is not a JSON array of names.
pub fn parse_domains(body: &str) -> Result<Vec<Domain>, LookupError> {
    let entries: Vec<Option<Domain>> = serde_json::from_str(body)?;
    Ok(entries.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slash() {
        let lookup = HttpDomainLookup::new("https://durin.dev/").unwrap();
        assert_eq!(lookup.endpoint(), "https://durin.dev/api/get-domains");
    }

    #[test]
    fn null_entries_are_dropped() {
        let body = r#"[
            {"name": "alice.eth", "owner": "0x1111111111111111111111111111111111111111", "resolver": null},
            null,
            {"name": "bob.eth", "owner": "0x2222222222222222222222222222222222222222",
             "resolver": "0x00f9314c69c3e7c37b3c7ad36ef9fb40d94edde1"}
        ]"#;
        let domains = parse_domains(body).unwrap();
        let names: Vec<_> = domains.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["alice.eth", "bob.eth"]);
        assert!(domains[1].has_resolver());
    }

    #[tokio::test]
    async fn unresponsive_service_times_out() {
        // Accepts connections into the backlog but never answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let lookup = HttpDomainLookup::with_timeout(base, Duration::from_millis(200)).unwrap();

        let err = lookup
            .domains_for(Address::repeat_byte(1), L1Network::Sepolia)
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Http(ref e) if e.is_timeout()), "{err}");
        drop(listener);
    }

    #[test]
    fn error_payload_is_a_decode_error() {
        let err = parse_domains(r#"{"error": "Failed to fetch names"}"#).unwrap_err();
        assert!(matches!(err, LookupError::Decode(_)), "{err}");
    }
}
