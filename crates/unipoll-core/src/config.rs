// ── Runtime connection configuration ──
//
// These types describe *how* to reach one controller site and how often
// to poll it. They carry credential data but never touch disk: the host
// application (CLI, or any other consumer) builds a `ControllerConfig`
// and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use unipoll_api::transport::{TlsMode, TransportConfig};

/// Default interval between scheduled refresh cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs). Must be opted into.
    DangerAcceptInvalid,
}

impl TlsVerification {
    /// Map a plain `verify_ssl` flag onto a strategy.
    pub fn from_verify_ssl(verify_ssl: bool) -> Self {
        if verify_ssl {
            Self::SystemDefaults
        } else {
            Self::DangerAcceptInvalid
        }
    }

    /// Whether server certificates are checked at all.
    pub fn verifies(&self) -> bool {
        !matches!(self, Self::DangerAcceptInvalid)
    }
}

/// Configuration for polling a single controller site.
///
/// Immutable once handed to a [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Controller host, optionally with port (e.g. `192.168.1.1` or `unifi.lan:8443`).
    pub host: String,
    /// Integration API key.
    pub api_key: SecretString,
    /// Site id to poll.
    pub site_id: String,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Interval between scheduled refresh cycles.
    pub poll_interval: Duration,
    /// Cap on concurrent per-device fetches within one cycle. `None` = unlimited.
    pub max_device_fetches: Option<usize>,
}

impl ControllerConfig {
    pub fn new(
        host: impl Into<String>,
        api_key: SecretString,
        site_id: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            api_key,
            site_id: site_id.into(),
            tls: TlsVerification::default(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_device_fetches: None,
        }
    }

    pub fn verify_ssl(&self) -> bool {
        self.tls.verifies()
    }

    /// HTTP transport settings for this controller.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: tls_to_transport(&self.tls),
            timeout: self.timeout,
        }
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
