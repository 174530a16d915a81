//! Remote data source for talaria
//!
//! [`ApiClient`] talks to the sensor monitoring API over blocking HTTP and
//! implements [`talaria_core::source::DataSource`], so the sample pipeline can
//! run directly against a live project. Responses are XML and are parsed with
//! `roxmltree`; the HTTP layer sits behind the [`Transport`] trait.

mod client;
pub mod transport;
pub mod xml;

pub use client::{ApiClient, ClientError, DEFAULT_HOST, DEFAULT_RETRY_DELAY, api_url};
pub use transport::{HttpTransport, Transport, TransportError};
