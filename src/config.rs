//! Client configuration.
//!
//! Defaults are production-friendly and every knob can be overridden from the
//! environment:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `ESCRUTA_CORE_URL` | `http://localhost:8080` |
//! | `ESCRUTA_HTTP_TIMEOUT_SECS` | unset (no request deadline) |
//! | `ESCRUTA_HTTP_POOL_MAX_IDLE_PER_HOST` | `32` |
//! | `ESCRUTA_HTTP_POOL_IDLE_TIMEOUT_SECS` | `90` |
//! | `ESCRUTA_PROXY_URL` | unset |

use crate::{Error, ErrorContext, Result};
use std::env;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Storage key of the persisted auth token.
pub const AUTH_TOKEN_KEY: &str = "authToken";

pub const DEFAULT_CACHE_CAPACITY: usize = 50;
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub proxy_url: Option<String>,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: None,
            pool_max_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            proxy_url: None,
            user_agent: format!("escruta-client/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn from_env() -> Result<Self> {
        let base = env::var("ESCRUTA_CORE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(&base)?;

        config.timeout = env_parse::<u64>("ESCRUTA_HTTP_TIMEOUT_SECS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        if let Some(n) = env_parse::<usize>("ESCRUTA_HTTP_POOL_MAX_IDLE_PER_HOST") {
            config.pool_max_idle_per_host = n;
        }
        if let Some(secs) = env_parse::<u64>("ESCRUTA_HTTP_POOL_IDLE_TIMEOUT_SECS") {
            config.pool_idle_timeout = Duration::from_secs(secs);
        }
        config.proxy_url = env::var("ESCRUTA_PROXY_URL").ok().filter(|s| !s.is_empty());
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            timeout: None,
            pool_max_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            proxy_url: None,
            user_agent: format!("escruta-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Parse a base URL, forcing a trailing slash so relative endpoints join under it.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&with_slash).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid base url '{}'", raw),
            ErrorContext::new()
                .with_field_path("config.base_url")
                .with_details(e.to_string())
                .with_source("client_config"),
        )
    })?;
    if url.cannot_be_a_base() {
        return Err(Error::configuration_with_context(
            format!("base url '{}' cannot carry a path", raw),
            ErrorContext::new()
                .with_field_path("config.base_url")
                .with_source("client_config"),
        ));
    }
    Ok(url)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}
