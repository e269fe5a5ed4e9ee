// Async HTTP client for the UniFi Network Integration API (read-only).
//
// Base path: /proxy/network/integration/
// Auth: X-API-Key header

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::types::{ApplicationInfo, Record, Site, WanListResponse};
use crate::Error;
use crate::transport::TransportConfig;

/// Page size for every paginated endpoint. The controller caps pages at 200.
pub const PAGE_LIMIT: usize = 200;

/// Envelope key holding the items of a paginated response.
pub const DEFAULT_DATA_KEY: &str = "data";

const INTEGRATION_PREFIX: &str = "/proxy/network/integration";

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the UniFi Integration API.
///
/// Cheap to clone: the underlying `reqwest::Client` shares its
/// connection pool across clones.
#[derive(Clone)]
pub struct IntegrationClient {
    http: reqwest::Client,
    base_url: Url,
    host: String,
}

impl std::fmt::Debug for IntegrationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl IntegrationClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a controller host, API key, and transport config.
    ///
    /// `host` is normally a bare `host[:port]`, which is reached over
    /// HTTPS. A full URL (`scheme://host[:port]`) is accepted as-is.
    /// Injects `X-API-Key` as a sensitive default header on every request.
    pub fn new(
        host: &str,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut key_value =
            HeaderValue::from_str(api_key.expose_secret()).map_err(|e| Error::InvalidApiKey {
                reason: e.to_string(),
            })?;
        key_value.set_sensitive(true);
        headers.insert("X-API-Key", key_value);

        let http = transport.build_client_with_headers(headers)?;
        Self::from_reqwest(host, http)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(host: &str, http: reqwest::Client) -> Result<Self, Error> {
        let host = host.trim().trim_end_matches('/').to_owned();
        let base_url = Self::normalize_base_url(&host)?;
        Ok(Self {
            http,
            base_url,
            host,
        })
    }

    /// Build `https://{host}/proxy/network/integration/`.
    fn normalize_base_url(host: &str) -> Result<Url, Error> {
        let raw = if host.contains("://") {
            host.to_owned()
        } else {
            format!("https://{host}")
        };
        let mut url = Url::parse(&raw)?;

        let path = url.path().trim_end_matches('/').to_owned();
        if path.ends_with("/integration") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}{INTEGRATION_PREFIX}/"));
        }

        Ok(url)
    }

    /// The normalized base URL (always ends in `/integration/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The controller host as configured.
    pub fn host(&self) -> &str {
        &self.host
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join an API path (`/v1/sites` or `v1/sites`) onto the base URL.
    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── Raw request ──────────────────────────────────────────────────

    /// Issue one request and decode the JSON body.
    ///
    /// 401/403 map to [`Error::Authentication`], any other non-200 to
    /// [`Error::Api`] with the body text, and failures below HTTP to
    /// [`Error::Connection`].
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("{method} {url} params={query:?}");

        let mut builder = self.http.request(method, url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        let resp = builder.send().await.map_err(|e| self.connection_error(e))?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Authentication {
                status: status.as_u16(),
            });
        }

        if status != StatusCode::OK {
            let body = resp.text().await.map_err(|e| self.connection_error(e))?;
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await.map_err(|e| self.connection_error(e))?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }

    fn connection_error(&self, source: reqwest::Error) -> Error {
        Error::Connection {
            host: self.host.clone(),
            source,
        }
    }

    // ── Pagination ───────────────────────────────────────────────────

    /// Collect every page of a list endpoint into one `Vec`.
    ///
    /// Requests `offset`/`limit` pages of [`PAGE_LIMIT`] and stops once the
    /// accumulated count reaches `totalCount`, or a page comes back empty
    /// or short. Any failed page aborts the whole walk.
    ///
    /// A short page ends the walk even when `totalCount` says more remain,
    /// so this assumes the controller honors `limit=200`.
    pub async fn paginate<T: DeserializeOwned>(
        &self,
        path: &str,
        data_key: &str,
    ) -> Result<Vec<T>, Error> {
        let mut all = Vec::new();
        let mut offset = 0usize;

        loop {
            let page: Value = self
                .request(
                    Method::GET,
                    path,
                    &[("offset", offset.to_string()), ("limit", PAGE_LIMIT.to_string())],
                )
                .await?;

            let (items, total) = split_page(page, data_key)?;
            let received = items.len();
            for item in items {
                all.push(decode_item(item)?);
            }

            let total = total.unwrap_or(all.len());
            if received == 0 || received < PAGE_LIMIT || all.len() >= total {
                break;
            }

            offset += PAGE_LIMIT;
        }

        debug!(path, count = all.len(), "pagination complete");
        Ok(all)
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── System Info ──────────────────────────────────────────────────

    pub async fn get_info(&self) -> Result<ApplicationInfo, Error> {
        self.request(Method::GET, "/v1/info", &[]).await
    }

    // ── Sites ────────────────────────────────────────────────────────

    pub async fn get_sites(&self) -> Result<Vec<Record>, Error> {
        self.paginate("/v1/sites", DEFAULT_DATA_KEY).await
    }

    /// Typed view of [`get_sites`](Self::get_sites).
    pub async fn list_sites(&self) -> Result<Vec<Site>, Error> {
        self.paginate("/v1/sites", DEFAULT_DATA_KEY).await
    }

    // ── Devices ──────────────────────────────────────────────────────

    pub async fn get_devices(&self, site_id: &str) -> Result<Vec<Record>, Error> {
        self.paginate(&format!("/v1/sites/{site_id}/devices"), DEFAULT_DATA_KEY)
            .await
    }

    pub async fn get_device_details(
        &self,
        site_id: &str,
        device_id: &str,
    ) -> Result<Record, Error> {
        self.request(
            Method::GET,
            &format!("/v1/sites/{site_id}/devices/{device_id}"),
            &[],
        )
        .await
    }

    /// Latest statistics sample only; the API keeps no history here.
    pub async fn get_device_statistics(
        &self,
        site_id: &str,
        device_id: &str,
    ) -> Result<Record, Error> {
        self.request(
            Method::GET,
            &format!("/v1/sites/{site_id}/devices/{device_id}/statistics/latest"),
            &[],
        )
        .await
    }

    // ── Clients ──────────────────────────────────────────────────────

    pub async fn get_clients(&self, site_id: &str) -> Result<Vec<Record>, Error> {
        self.paginate(&format!("/v1/sites/{site_id}/clients"), DEFAULT_DATA_KEY)
            .await
    }

    // ── WAN (read-only) ──────────────────────────────────────────────

    pub async fn get_wans(&self, site_id: &str) -> Result<Vec<Record>, Error> {
        let resp: WanListResponse = self
            .request(Method::GET, &format!("/v1/sites/{site_id}/wans"), &[])
            .await?;
        Ok(resp.into_records())
    }
}

// ── Page helpers ─────────────────────────────────────────────────────

/// Split a list envelope into its items and `totalCount`.
///
/// A missing `data_key` reads as an empty page.
fn split_page(page: Value, data_key: &str) -> Result<(Vec<Value>, Option<usize>), Error> {
    let mut envelope = match page {
        Value::Object(envelope) => envelope,
        other => {
            return Err(Error::Deserialization {
                message: format!("expected a paginated object envelope, got {}", kind_of(&other)),
                body: other.to_string(),
            });
        }
    };

    let total = envelope
        .get("totalCount")
        .and_then(Value::as_u64)
        .and_then(|t| usize::try_from(t).ok());

    let items = match envelope.remove(data_key) {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            return Err(Error::Deserialization {
                message: format!("expected `{data_key}` to be an array, got {}", kind_of(&other)),
                body: other.to_string(),
            });
        }
    };

    Ok((items, total))
}

fn decode_item<T: DeserializeOwned>(item: Value) -> Result<T, Error> {
    serde_json::from_value(item.clone()).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: item.to_string(),
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
