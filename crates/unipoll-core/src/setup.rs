// ── Setup probe ──
//
// Validates a host/key pair before polling starts and discovers which
// sites the key can see.

use thiserror::Error;
use tracing::{debug, warn};

use unipoll_api::{ApplicationInfo, IntegrationClient, Site};

use crate::error::CoreError;

/// Why a setup probe failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("the controller rejected the API key")]
    InvalidCredentials,

    #[error("cannot connect to the controller: {0}")]
    CannotConnect(String),

    #[error("the API key has access to no sites")]
    NoSites,

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl From<unipoll_api::Error> for SetupError {
    fn from(err: unipoll_api::Error) -> Self {
        match err {
            unipoll_api::Error::Authentication { .. } | unipoll_api::Error::InvalidApiKey { .. } => {
                Self::InvalidCredentials
            }
            unipoll_api::Error::Connection { .. }
            | unipoll_api::Error::Tls(_)
            | unipoll_api::Error::InvalidUrl(_) => Self::CannotConnect(err.to_string()),
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// What a successful probe learned about the controller.
#[derive(Debug, Clone)]
pub struct SetupProbe {
    pub info: ApplicationInfo,
    /// Never empty.
    pub sites: Vec<Site>,
}

impl SetupProbe {
    /// The only site, when there is exactly one.
    pub fn default_site(&self) -> Option<&Site> {
        match self.sites.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Find a site by id, name or internal reference.
    ///
    /// With no selector, falls back to [`default_site`](Self::default_site).
    pub fn select_site(&self, selector: Option<&str>) -> Result<&Site, CoreError> {
        let Some(selector) = selector else {
            return self
                .default_site()
                .ok_or_else(|| CoreError::SiteSelectionRequired {
                    candidates: self.sites.iter().map(|s| s.id.clone()).collect(),
                });
        };

        self.sites
            .iter()
            .find(|s| s.id == selector)
            .or_else(|| {
                self.sites.iter().find(|s| {
                    s.name.as_deref() == Some(selector)
                        || s.internal_reference.as_deref() == Some(selector)
                })
            })
            .ok_or_else(|| CoreError::SiteNotFound {
                name: selector.to_owned(),
            })
    }
}

/// Stable identity of one polled site: `{host}_{site_id}`.
pub fn unique_id(host: &str, site_id: &str) -> String {
    format!("{host}_{site_id}")
}

/// Human-facing title for one polled site.
pub fn entry_title(host: &str, site: &Site) -> String {
    format!("UniFi {} ({host})", site.display_name())
}

/// Check credentials with `GET /v1/info`, then list sites.
pub async fn probe(client: &IntegrationClient) -> Result<SetupProbe, SetupError> {
    let info = client.get_info().await.inspect_err(|e| {
        warn!(host = client.host(), error = %e, "setup probe failed");
    })?;
    debug!(version = ?info.application_version, "controller reachable");

    let sites = client.list_sites().await?;
    if sites.is_empty() {
        return Err(SetupError::NoSites);
    }

    Ok(SetupProbe { info, sites })
}
