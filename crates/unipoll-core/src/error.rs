// ── Core error types ──
//
// User-facing errors from unipoll-core. Consumers never see raw HTTP
// status codes or JSON parse failures directly: the
// `From<unipoll_api::Error>` impl translates transport-layer errors into
// domain-appropriate variants, and a failed refresh cycle is reported as a
// `RefreshError`.

use strum::Display;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to controller at {host}: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Site not found: {name}")]
    SiteNotFound { name: String },

    #[error("Controller has {} sites; choose one of: {}", candidates.len(), candidates.join(", "))]
    SiteSelectionRequired { candidates: Vec<String> },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<unipoll_api::Error> for CoreError {
    fn from(err: unipoll_api::Error) -> Self {
        match err {
            unipoll_api::Error::Authentication { status } => CoreError::AuthenticationFailed {
                message: format!("controller rejected the API key (HTTP {status})"),
            },
            unipoll_api::Error::InvalidApiKey { reason } => CoreError::AuthenticationFailed {
                message: format!("invalid API key: {reason}"),
            },
            unipoll_api::Error::Connection { host, source } => CoreError::ConnectionFailed {
                host,
                reason: source.to_string(),
            },
            unipoll_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            unipoll_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            unipoll_api::Error::Api { status, body } => CoreError::Api {
                message: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                },
                status: Some(status),
            },
            unipoll_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("unexpected response: {message}"),
                status: None,
            },
        }
    }
}

// ── Refresh cycle failure ────────────────────────────────────────────

/// Why a refresh cycle was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RefreshErrorKind {
    /// The controller rejected the credentials; polling stops until the
    /// host re-authenticates.
    AuthenticationFailed,
    /// Any other failure; the next scheduled cycle retries.
    UpdateFailed,
}

/// A failed refresh cycle, as surfaced to subscribers.
///
/// The previous snapshot stays current when one of these is published.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RefreshError {
    pub kind: RefreshErrorKind,
    pub message: String,
}

impl RefreshError {
    pub fn requires_reauth(&self) -> bool {
        self.kind == RefreshErrorKind::AuthenticationFailed
    }
}

impl From<unipoll_api::Error> for RefreshError {
    fn from(err: unipoll_api::Error) -> Self {
        if err.is_auth_failure() {
            Self {
                kind: RefreshErrorKind::AuthenticationFailed,
                message: format!("Authentication failed: {err}"),
            }
        } else {
            Self {
                kind: RefreshErrorKind::UpdateFailed,
                message: format!("Error communicating with UniFi API: {err}"),
            }
        }
    }
}
