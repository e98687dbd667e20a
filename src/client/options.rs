use crate::config::{DEFAULT_CACHE_TIME, DEFAULT_RETRY_DELAY};
use crate::error::FetchError;
use crate::transport::RequestBody;
use reqwest::Method;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&FetchError) + Send + Sync>;

/// Per-request options.
///
/// Defaults: `GET`, 5 minute cache time, no retries, 1 second retry delay.
pub struct FetchOptions<T> {
    pub(crate) method: Method,
    pub(crate) params: Option<Value>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: RequestBody,
    pub(crate) base_url: Option<Url>,
    pub(crate) cache_time: Duration,
    pub(crate) skip_cache: bool,
    pub(crate) retry: u32,
    pub(crate) retry_delay: Duration,
    pub(crate) on_success: Option<SuccessCallback<T>>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl<T> FetchOptions<T> {
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            params: None,
            headers: Vec::new(),
            body: RequestBody::Empty,
            base_url: None,
            cache_time: DEFAULT_CACHE_TIME,
            skip_cache: false,
            retry: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
            on_success: None,
            on_error: None,
        }
    }

    pub fn get() -> Self {
        Self::new()
    }

    pub fn post() -> Self {
        Self::new().method(Method::POST)
    }

    pub fn put() -> Self {
        Self::new().method(Method::PUT)
    }

    pub fn delete() -> Self {
        Self::new().method(Method::DELETE)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add one query parameter; non-string values are sent as their JSON text.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = match self.params.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert(key.into(), value.into());
        self.params = Some(Value::Object(map));
        self
    }

    /// Replace all query parameters. Only JSON objects are accepted; anything else clears them.
    pub fn params(mut self, params: Value) -> Self {
        self.params = match params {
            Value::Object(map) => Some(Value::Object(map)),
            _ => None,
        };
        self
    }

    /// Caller headers are applied last and override the defaults.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn json(self, value: Value) -> Self {
        self.body(RequestBody::Json(value))
    }

    /// Send this request to another server. The URL is treated as a directory.
    pub fn base_url(mut self, mut url: Url) -> Self {
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.base_url = Some(url);
        self
    }

    /// How long a cached response stays fresh. `Duration::ZERO` disables caching.
    pub fn cache_time(mut self, ttl: Duration) -> Self {
        self.cache_time = ttl;
        self
    }

    pub fn skip_cache(mut self, skip: bool) -> Self {
        self.skip_cache = skip;
        self
    }

    /// Extra attempts after the first failure.
    pub fn retry(mut self, retries: u32) -> Self {
        self.retry = retries;
        self
    }

    /// Base delay; the n-th retry waits `retry_delay * n`.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn on_success(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&FetchError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn method_ref(&self) -> &Method {
        &self.method
    }

    pub fn params_ref(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    /// Whether this call may read or write the cache at all. Only GET responses are cached.
    pub(crate) fn uses_cache(&self, force: bool) -> bool {
        !force && !self.skip_cache && !self.cache_time.is_zero() && self.method == Method::GET
    }

    pub(crate) fn stores_in_cache(&self) -> bool {
        !self.cache_time.is_zero() && self.method == Method::GET
    }

    pub(crate) fn notify_success(&self, data: &T) {
        if let Some(cb) = &self.on_success {
            cb(data);
        }
    }

    pub(crate) fn notify_error(&self, error: &FetchError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }
}

impl<T> Default for FetchOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FetchOptions<T> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            params: self.params.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            base_url: self.base_url.clone(),
            cache_time: self.cache_time,
            skip_cache: self.skip_cache,
            retry: self.retry,
            retry_delay: self.retry_delay,
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T> fmt::Debug for FetchOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("method", &self.method)
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("base_url", &self.base_url)
            .field("cache_time", &self.cache_time)
            .field("skip_cache", &self.skip_cache)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}
