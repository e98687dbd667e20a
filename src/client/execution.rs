//! 请求执行逻辑：缓存查询、重试与取消。
//!
//! Request execution: cache lookup, attempts with linear backoff, cancellation.

use super::core::FetchClient;
use super::options::FetchOptions;
use crate::cache::{generate_cache_key, CacheEntry, RequestDescriptor};
use crate::error::FetchError;
use crate::transport::{HttpRequest, Payload};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl FetchClient {
    pub(crate) fn cache_key<T>(&self, endpoint: &str, options: &FetchOptions<T>) -> String {
        let (body, data) = options.body.cache_fragments();
        generate_cache_key(
            endpoint,
            &RequestDescriptor {
                method: &options.method,
                params: options.params.as_ref(),
                body: body.as_ref(),
                data: data.as_ref(),
            },
        )
    }

    /// A fresh cached value, if this call may use the cache and one exists.
    ///
    /// Entries that no longer decode as `T` count as misses.
    pub(crate) fn cached<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &FetchOptions<T>,
        force: bool,
    ) -> Option<T> {
        if !options.uses_cache(force) {
            return None;
        }
        let key = self.cache_key(endpoint, options);
        let entry = self.cache.get(&key)?;
        if !entry.is_fresh(options.cache_time) {
            debug!(endpoint, "cached response is stale");
            return None;
        }
        match entry.data.decode() {
            Ok(data) => {
                debug!(endpoint, "serving response from cache");
                Some(data)
            }
            Err(e) => {
                debug!(endpoint, error = %e, "cached response has a different shape");
                None
            }
        }
    }

    /// One network attempt, decoded as `T`.
    async fn attempt<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &FetchOptions<T>,
    ) -> std::result::Result<(T, Payload), FetchError> {
        let url = self
            .transport
            .resolve_url(options.base_url.as_ref(), endpoint, options.params.as_ref())
            .map_err(|e| FetchError::network(e.to_string()))?;
        let token = self.current_token().await;

        let request = HttpRequest {
            method: options.method.clone(),
            url,
            headers: &options.headers,
            body: &options.body,
            bearer: token.as_ref().and_then(|t| t.bearer()),
        };
        let response = self.transport.send(&request).await?;
        let data = response
            .payload
            .clone()
            .decode::<T>()
            .map_err(|e| FetchError::decode(response.status, format!("unexpected response shape: {}", e)))?;
        Ok((data, response.payload))
    }

    /// Run attempts until one succeeds, retries run out, or `cancel` fires.
    ///
    /// Retry `n` (1-based) waits `retry_delay * n`. Only [`Error::Fetch`] and
    /// [`Error::Cancelled`] come out of here.
    pub(crate) async fn fetch_with_retry<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &FetchOptions<T>,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let start = Instant::now();
        let mut last_error = FetchError::network("request was never attempted");
        let mut attempts = 0u32;

        for attempt in 0..=options.retry {
            attempts += 1;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(endpoint, attempt, "request cancelled");
                    return Err(Error::Cancelled);
                }
                r = self.attempt(endpoint, options) => r,
            };

            match outcome {
                Ok((data, payload)) => {
                    if cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    if options.stores_in_cache() {
                        self.cache
                            .set(self.cache_key(endpoint, options), CacheEntry::new(payload));
                    }
                    debug!(
                        endpoint,
                        method = options.method.as_str(),
                        attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "request succeeded"
                    );
                    return Ok(data);
                }
                Err(e) => {
                    warn!(
                        endpoint,
                        method = options.method.as_str(),
                        http_status = e.status,
                        attempt,
                        error = e.message.as_str(),
                        "request attempt failed"
                    );
                    let retryable = e.is_retryable();
                    last_error = e;
                    if !retryable {
                        break;
                    }
                    if attempt < options.retry {
                        let delay = options.retry_delay.saturating_mul(attempt + 1);
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(Error::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        info!(
            endpoint,
            method = options.method.as_str(),
            http_status = last_error.status,
            error_class = last_error.class().name(),
            attempts,
            duration_ms = start.elapsed().as_millis() as u64,
            "request failed"
        );
        Err(Error::Fetch(last_error))
    }
}
