//! CLI-specific config resolution: profile + flag overrides.

use std::time::Duration;

use secrecy::SecretString;

use unipoll_config::{Config, Profile};
use unipoll_core::{ControllerConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Profile name selected by `--profile`, falling back to the config default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| cfg.active_profile_name().to_owned())
}

/// Build a `ControllerConfig` from the config file, profile, and CLI overrides.
///
/// `site_id` holds the `--site` / profile selector verbatim (possibly
/// empty); it is resolved to a real site id by the setup probe.
pub fn resolve_controller_config(global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
    let cfg = unipoll_config::load_config()?;
    resolve_with(global, &cfg)
}

fn resolve_with(global: &GlobalOpts, cfg: &Config) -> Result<ControllerConfig, CliError> {
    let profile_name = active_profile_name(global, cfg);
    let flag_key = global.api_key.clone().map(SecretString::from);

    let mut config = if let Some(profile) = cfg.profiles.get(&profile_name) {
        from_profile(profile, &profile_name, cfg, global, flag_key)?
    } else if global.profile.is_some() {
        // An explicitly requested profile must exist.
        let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available.join(", "),
        });
    } else {
        from_flags(global, cfg, &profile_name, flag_key)?
    };

    apply_overrides(&mut config, global);
    Ok(config)
}

fn from_profile(
    profile: &Profile,
    profile_name: &str,
    cfg: &Config,
    global: &GlobalOpts,
    flag_key: Option<SecretString>,
) -> Result<ControllerConfig, CliError> {
    let mut profile = profile.clone();
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }

    let config = match flag_key {
        Some(key) => unipoll_config::controller_config_with_key(&profile, &cfg.defaults, key)?,
        None => unipoll_config::profile_to_controller_config(&profile, profile_name, &cfg.defaults)?,
    };
    Ok(config)
}

fn from_flags(
    global: &GlobalOpts,
    cfg: &Config,
    profile_name: &str,
    flag_key: Option<SecretString>,
) -> Result<ControllerConfig, CliError> {
    let host = global.host.as_deref().ok_or_else(|| CliError::NoConfig {
        path: unipoll_config::config_path().display().to_string(),
    })?;

    let api_key = flag_key.ok_or_else(|| CliError::NoCredentials {
        profile: profile_name.to_owned(),
    })?;

    let mut config = ControllerConfig::new(host.trim(), api_key, String::new());
    config.timeout = Duration::from_secs(cfg.defaults.timeout);
    config.poll_interval =
        unipoll_config::parse_interval("poll_interval", &cfg.defaults.poll_interval)?;
    Ok(config)
}

fn apply_overrides(config: &mut ControllerConfig, global: &GlobalOpts) {
    if let Some(ref site) = global.site {
        config.site_id.clone_from(site);
    }
    if global.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }
}
