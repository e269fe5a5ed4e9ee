//! Configuration for the unipoll CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `unipoll_core::ControllerConfig`. The CLI layers
//! its flag overrides on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use unipoll_core::{ControllerConfig, TlsVerification};

/// Keyring service name; entries are keyed `{profile}/api-key`.
pub const KEYRING_SERVICE: &str = "unipoll";

/// Environment prefix merged over the config file.
pub const ENV_PREFIX: &str = "UNIPOLL_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    ProfileNotFound { name: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use when none is given explicitly.
    pub fn active_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Poll interval, humantime syntax (`30s`, `2m`).
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> String {
    "30s".into()
}

/// A named controller profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Controller host, optionally with port (e.g., "192.168.1.1").
    pub host: String,

    /// Site id. When absent the setup probe picks the only site.
    pub site_id: Option<String>,

    /// API key (plaintext; prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// Verify the controller's TLS certificate. Defaults to true.
    pub verify_ssl: Option<bool>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Request timeout in seconds.
    pub timeout: Option<u64>,

    /// Poll interval, humantime syntax.
    pub poll_interval: Option<String>,

    /// Cap on concurrent per-device fetches.
    pub max_device_fetches: Option<usize>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "unipoll", "unipoll").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("unipoll");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the default path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load Config from `path` + environment. A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve an API key from the credential chain: env var named by
/// `api_key_env`, then the system keyring, then plaintext.
pub fn resolve_api_key(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_api_key_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        keyring_lookup,
    )
}

fn keyring_lookup(profile_name: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/api-key"))
        .and_then(|entry| entry.get_password())
        .ok()
}

fn resolve_api_key_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's api_key_env → env var lookup
    if let Some(val) = profile.api_key_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Some(secret) = keyring(profile_name) {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(ref key) = profile.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation to core config ──────────────────────────────────────

/// TLS strategy for a profile: `verify_ssl = false` wins, then a pinned CA.
pub fn profile_tls(profile: &Profile) -> TlsVerification {
    if !profile.verify_ssl.unwrap_or(true) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}

/// Parse a humantime interval such as `30s` or `2m`.
pub fn parse_interval(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    let interval = humantime::parse_duration(raw).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("'{raw}': {e}"),
    })?;
    if interval.is_zero() {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(interval)
}

/// Build a `ControllerConfig` from a profile, without CLI overrides.
///
/// `site_id` is left empty when the profile has none; the caller fills it
/// in after running the setup probe.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ControllerConfig, ConfigError> {
    validate_profile(profile)?;
    let api_key = resolve_api_key(profile, profile_name)?;
    controller_config_with_key(profile, defaults, api_key)
}

/// Like [`profile_to_controller_config`] with an already-resolved key.
pub fn controller_config_with_key(
    profile: &Profile,
    defaults: &Defaults,
    api_key: SecretString,
) -> Result<ControllerConfig, ConfigError> {
    validate_profile(profile)?;

    let poll_interval = parse_interval(
        "poll_interval",
        profile
            .poll_interval
            .as_deref()
            .unwrap_or(defaults.poll_interval.as_str()),
    )?;

    let mut config = ControllerConfig::new(
        profile.host.trim(),
        api_key,
        profile.site_id.clone().unwrap_or_default(),
    );
    config.tls = profile_tls(profile);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.poll_interval = poll_interval;
    config.max_device_fetches = profile.max_device_fetches;
    Ok(config)
}

fn validate_profile(profile: &Profile) -> Result<(), ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }

    if profile.max_device_fetches == Some(0) {
        return Err(ConfigError::Validation {
            field: "max_device_fetches".into(),
            reason: "must be at least 1".into(),
        });
    }

    Ok(())
}
