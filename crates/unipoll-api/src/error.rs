use thiserror::Error;

/// Top-level error type for the `unipoll-api` crate.
///
/// Every request to the controller resolves to exactly one of these.
/// `unipoll-core` maps them into cycle-level failures.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The controller rejected the API key (HTTP 401 or 403).
    #[error("Authentication failed: HTTP {status}")]
    Authentication { status: u16 },

    /// The API key cannot be sent as a header value.
    #[error("Invalid API key: {reason}")]
    InvalidApiKey { reason: String },

    // ── Transport ───────────────────────────────────────────────────
    /// DNS, TCP, TLS handshake, timeout, or body read failure.
    #[error("Cannot connect to UniFi controller at {host}: {source}")]
    Connection {
        host: String,
        #[source]
        source: reqwest::Error,
    },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration error (unreadable CA bundle, client build failure).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Integration API ─────────────────────────────────────────────
    /// Any non-200 response other than 401/403.
    #[error("API request failed ({status}): {body}")]
    Api { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the controller refused the credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::InvalidApiKey { .. })
    }

    /// Returns `true` if the failure happened below HTTP (no response).
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns `true` if this is a transient error worth retrying on the
    /// next cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// HTTP status code, when the controller answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status } | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
