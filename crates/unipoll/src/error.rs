//! CLI error types with miette diagnostics.
//!
//! Maps core, setup and config errors into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use unipoll_config::ConfigError;
use unipoll_core::{CoreError, RefreshError, SetupError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to controller at {host}")]
    #[diagnostic(
        code(unipoll::connection_failed),
        help(
            "Check that the controller is running and reachable: {reason}\n\
             Self-signed certificate? Try --insecure (-k) or set ca_cert in your profile."
        )
    )]
    ConnectionFailed { host: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(unipoll::auth_failed),
        help(
            "Verify the API key under Settings > Control Plane > Integrations \
             on your controller, then restart."
        )
    )]
    AuthFailed { message: String },

    #[error("No API key configured for profile '{profile}'")]
    #[diagnostic(
        code(unipoll::no_credentials),
        help(
            "Pass --api-key, set UNIPOLL_API_KEY, or add api_key / api_key_env \
             to the profile."
        )
    )]
    NoCredentials { profile: String },

    // ── Sites ────────────────────────────────────────────────────────
    #[error("The API key has access to no sites")]
    #[diagnostic(code(unipoll::no_sites))]
    NoSites,

    #[error("Site '{name}' not found")]
    #[diagnostic(
        code(unipoll::site_not_found),
        help("Run: unipoll probe to list available sites")
    )]
    SiteNotFound { name: String },

    #[error("Controller has several sites; choose one with --site")]
    #[diagnostic(code(unipoll::site_required), help("Available sites: {candidates}"))]
    SiteRequired { candidates: String },

    // ── Polling ──────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(unipoll::refresh_failed))]
    RefreshFailed { message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(unipoll::api_error))]
    Api { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(unipoll::validation))]
    Validation { field: String, reason: String },

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(unipoll::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No controller configured")]
    #[diagnostic(
        code(unipoll::no_config),
        help(
            "Pass --host and --api-key, or create a profile.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration could not be loaded: {message}")]
    #[diagnostic(code(unipoll::config))]
    Config { message: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    #[diagnostic(code(unipoll::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NoSites | Self::SiteNotFound { .. } => exit_code::NOT_FOUND,
            Self::SiteRequired { .. }
            | Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. }
            | Self::Config { .. } => exit_code::CONFIG,
            Self::RefreshFailed { .. } | Self::Api { .. } | Self::Io(_) | Self::Json(_) => {
                exit_code::GENERAL
            }
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { host, reason } => Self::ConnectionFailed { host, reason },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::SiteNotFound { name } => Self::SiteNotFound { name },
            CoreError::SiteSelectionRequired { candidates } => Self::SiteRequired {
                candidates: candidates.join(", "),
            },
            CoreError::Api { message, status: _ } | CoreError::Internal(message) => {
                Self::Api { message }
            }
            CoreError::Config { message } => Self::Config { message },
        }
    }
}

impl CliError {
    /// Map a failed setup probe against `host`.
    pub fn from_setup(err: SetupError, host: &str) -> Self {
        match err {
            SetupError::InvalidCredentials => Self::AuthFailed {
                message: err.to_string(),
            },
            SetupError::CannotConnect(reason) => Self::ConnectionFailed {
                host: host.into(),
                reason,
            },
            SetupError::NoSites => Self::NoSites,
            SetupError::Unknown(message) => Self::Api { message },
        }
    }
}

impl From<RefreshError> for CliError {
    fn from(err: RefreshError) -> Self {
        if err.requires_reauth() {
            Self::AuthFailed {
                message: err.message,
            }
        } else {
            Self::RefreshFailed {
                message: err.message,
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::ProfileNotFound { name } => Self::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Figment(e) => Self::Config {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unipoll_core::RefreshErrorKind;

    #[test]
    fn exit_codes_by_category() {
        assert_eq!(
            CliError::from_setup(SetupError::InvalidCredentials, "h").exit_code(),
            exit_code::AUTH
        );
        assert_eq!(
            CliError::from_setup(SetupError::CannotConnect("refused".into()), "h").exit_code(),
            exit_code::CONNECTION
        );
        assert_eq!(
            CliError::NoConfig {
                path: "/x".into()
            }
            .exit_code(),
            exit_code::CONFIG
        );
        assert_eq!(
            CliError::from(RefreshError {
                kind: RefreshErrorKind::UpdateFailed,
                message: "Error communicating with UniFi API: boom".into(),
            })
            .exit_code(),
            exit_code::GENERAL
        );
    }

    #[test]
    fn reauth_refresh_error_is_auth_failure() {
        let err = CliError::from(RefreshError {
            kind: RefreshErrorKind::AuthenticationFailed,
            message: "Authentication failed: HTTP 401".into(),
        });
        assert!(matches!(err, CliError::AuthFailed { .. }));
    }
}
