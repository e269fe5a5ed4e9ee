// unipoll-api: Async Rust client for the UniFi Network Integration API

pub mod error;
pub mod integration;
pub mod transport;

pub use error::Error;
pub use integration::IntegrationClient;
pub use integration::types::{ApplicationInfo, Record, Site};
pub use transport::{TlsMode, TransportConfig};

/// Re-exported so callers of [`IntegrationClient::request`] need no direct
/// `reqwest` dependency.
pub use reqwest::Method;
