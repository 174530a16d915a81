//! HTTP transport seam
//!
//! [`ApiClient`](crate::ApiClient) only needs "GET this URL, give me the
//! body". Anything that fails before a body arrives is a [`TransportError`]
//! and is retried by the client.

use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;

/// Per-request timeout of [`HttpTransport`]
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A request that produced no response body
#[derive(Debug, Error)]
#[error("Transport failed: {details}")]
pub struct TransportError {
    pub details: String,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            details: e.to_string(),
        }
    }
}

/// Blocking GET of a URL
pub trait Transport {
    fn get(&self, url: &str) -> Result<String, TransportError>;
}

/// [`Transport`] over a `reqwest` blocking client.
///
/// The cookie store keeps the session established by `login` alive for
/// every later request.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<String, TransportError> {
        let body = self.client.get(url).send()?.text()?;
        Ok(body)
    }
}
