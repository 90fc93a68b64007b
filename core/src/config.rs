//! Client configuration.
//!
//! `BACKEND_BASE_URL` names the REST root (resources live directly beneath
//! it, e.g. `http://localhost:8000/api/subjects`). Auth endpoints sit under
//! `BACKEND_AUTH_PATH` relative to that root.

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const BASE_URL_VAR: &str = "BACKEND_BASE_URL";
pub const AUTH_PATH_VAR: &str = "BACKEND_AUTH_PATH";
pub const TIMEOUT_VAR: &str = "BACKEND_TIMEOUT_SECS";

const DEFAULT_AUTH_PATH: &str = "auth";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: Url,
    pub auth_path: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(trimmed).map_err(|source| ConfigError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        Ok(Self {
            base_url,
            auth_path: DEFAULT_AUTH_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("campus-core/", env!("CARGO_PKG_VERSION")).to_string(),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let base = std::env::var(BASE_URL_VAR).map_err(|_| ConfigError::Missing(BASE_URL_VAR))?;
        let mut config = Self::new(&base)?;
        if let Ok(path) = std::env::var(AUTH_PATH_VAR) {
            config = config.with_auth_path(&path);
        }
        if let Ok(raw) = std::env::var(TIMEOUT_VAR) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: TIMEOUT_VAR,
                value: raw.clone(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_auth_path(mut self, path: &str) -> Self {
        self.auth_path = path.trim_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The REST root without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn resource_url(&self, resource: &str) -> String {
        format!("{}/{}", self.api_root(), resource.trim_matches('/'))
    }

    /// URL of one record. The id is percent-encoded as a single path segment,
    /// so `/`, `?` and `#` inside it cannot reshape the request.
    pub fn record_url(&self, resource: &str, id: &str) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(resource.split('/').filter(|s| !s.is_empty()))
                .push(id);
        } else {
            let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
            return format!("{}/{}", self.resource_url(resource), encoded.replace('+', "%20"));
        }
        url.into()
    }

    pub fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/{}/{}", self.api_root(), self.auth_path, endpoint.trim_start_matches('/'))
    }

    /// Absolute URLs pass through; anything else is taken relative to the root.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.resource_url(url)
        }
    }
}
