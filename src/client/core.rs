use crate::auth::{MemoryTokenStore, Token, TokenStore};
use crate::cache::RequestCache;
use crate::client::fetcher::Fetcher;
use crate::client::options::FetchOptions;
use crate::transport::HttpTransport;
use crate::Result;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shared entry point: one transport, one request cache, one token store.
///
/// Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct FetchClient {
    pub(crate) transport: Arc<HttpTransport>,
    pub(crate) cache: Arc<RequestCache>,
    pub(crate) tokens: Arc<dyn TokenStore>,
}

impl FetchClient {
    /// Client configured from the environment with an in-memory token store.
    pub fn new() -> Result<Self> {
        crate::client::builder::FetchClientBuilder::new().build()
    }

    pub fn builder() -> crate::client::builder::FetchClientBuilder {
        crate::client::builder::FetchClientBuilder::new()
    }

    pub(crate) fn from_parts(
        transport: HttpTransport,
        cache: Arc<RequestCache>,
        tokens: Option<Arc<dyn TokenStore>>,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            cache,
            tokens: tokens.unwrap_or_else(|| Arc::new(MemoryTokenStore::new())),
        }
    }

    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.cache
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    /// Drop cached reads for `endpoint` (and everything nested under it), or the whole cache.
    ///
    /// Call this after a mutation that invalidates earlier reads.
    pub fn clear_cache(&self, endpoint: Option<&str>) {
        match endpoint {
            Some(ep) => {
                let removed = self.cache.delete_by_endpoint(ep);
                debug!(endpoint = ep, removed, "cleared cached endpoint");
            }
            None => {
                self.cache.clear();
                debug!("cleared request cache");
            }
        }
    }

    /// Current token, or `None` when signed out. Store failures read as signed out.
    pub async fn current_token(&self) -> Option<Token> {
        match self.tokens.load().await {
            Ok(token) => token,
            Err(e) => {
                warn!(store = self.tokens.name(), error = %e, "token store unavailable, sending unauthenticated");
                None
            }
        }
    }

    /// Stateful fetcher bound to one endpoint. With `immediate`, the first fetch starts right away.
    pub fn fetcher<T>(&self, endpoint: impl Into<String>, options: FetchOptions<T>, immediate: bool) -> Fetcher<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        Fetcher::new(self.clone(), endpoint, options, immediate)
    }

    /// One-shot request: cache lookup, network with retries, cache write. Callbacks still fire.
    pub async fn request<T>(&self, endpoint: &str, options: &FetchOptions<T>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if let Some(data) = self.cached(endpoint, options, false) {
            options.notify_success(&data);
            return Ok(data);
        }
        let cancel = CancellationToken::new();
        match self.fetch_with_retry(endpoint, options, &cancel).await {
            Ok(data) => {
                options.notify_success(&data);
                Ok(data)
            }
            Err(crate::Error::Fetch(e)) => {
                options.notify_error(&e);
                Err(e.into())
            }
            Err(e) => Err(e),
        }
    }
}
