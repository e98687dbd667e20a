use crate::auth::TokenStore;
use crate::cache::RequestCache;
use crate::client::core::FetchClient;
use crate::config::{parse_base_url, ClientConfig, DEFAULT_CACHE_CAPACITY};
use crate::transport::HttpTransport;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating clients with custom configuration.
///
/// Without an explicit config the environment is read (see [`ClientConfig::from_env`]).
pub struct FetchClientBuilder {
    config: Option<ClientConfig>,
    base_url_override: Option<String>,
    timeout: Option<Duration>,
    cache_capacity: usize,
    cache: Option<Arc<RequestCache>>,
    tokens: Option<Arc<dyn TokenStore>>,
}

impl FetchClientBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            base_url_override: None,
            timeout: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache: None,
            tokens: None,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the base URL (mock servers, staging backends).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// Per-request deadline. Unset by default: retries are the only temporal control.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    /// Share an existing cache between several clients.
    pub fn cache(mut self, cache: Arc<RequestCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(store);
        self
    }

    pub fn build(self) -> Result<FetchClient> {
        let mut config = match self.config {
            Some(c) => c,
            None => ClientConfig::from_env()?,
        };
        if let Some(base) = self.base_url_override.as_deref() {
            config.base_url = parse_base_url(base)?;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = Some(timeout);
        }

        let transport = HttpTransport::new(&config)?;
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(RequestCache::new(self.cache_capacity)));

        tracing::debug!(
            base_url = config.base_url.as_str(),
            cache_capacity = cache.capacity(),
            "escruta client ready"
        );
        Ok(FetchClient::from_parts(transport, cache, self.tokens))
    }
}

impl Default for FetchClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
