use super::body::{extract_error_message, Payload, RequestBody};
use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::Result;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Proxy};
use serde_json::Value;
use std::time::Instant;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Everything needed to put one request on the wire.
#[derive(Debug, Clone)]
pub struct HttpRequest<'a> {
    pub method: Method,
    pub url: Url,
    pub headers: &'a [(String, String)],
    pub body: &'a RequestBody,
    /// Sent as `Authorization: Bearer …` when present and non-empty.
    pub bearer: Option<&'a str>,
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub payload: Payload,
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(config.pool_idle_timeout));

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(proxy_url) = &config.proxy_url {
            match Proxy::all(proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => tracing::warn!(proxy = proxy_url.as_str(), error = %e, "ignoring invalid proxy url"),
            }
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(super::TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join `endpoint` under `base` (or the configured base) and append query parameters.
    ///
    /// Parameter values are coerced to strings: JSON strings verbatim, everything else as JSON text.
    pub fn resolve_url(
        &self,
        base: Option<&Url>,
        endpoint: &str,
        params: Option<&Value>,
    ) -> Result<Url> {
        let base = base.unwrap_or(&self.base_url);
        let mut url = base
            .join(crate::cache::normalize_endpoint(endpoint))
            .map_err(|e| {
                crate::Error::Transport(super::TransportError::InvalidUrl(format!(
                    "{}: {}",
                    endpoint, e
                )))
            })?;

        if let Some(Value::Object(map)) = params {
            if !map.is_empty() {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in map {
                    pairs.append_pair(key, &param_to_string(value));
                }
            }
        }
        Ok(url)
    }

    fn build_headers(request: &HttpRequest<'_>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = request.bearer.filter(|t| !t.is_empty()) {
            if let Ok(v) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, v);
            }
        }
        if !request.body.is_multipart() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Ok(v) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            headers.insert("x-request-id", v);
        }
        for (name, value) in request.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(n), Ok(v)) => {
                    if request.body.is_multipart() && n == CONTENT_TYPE {
                        continue;
                    }
                    headers.insert(n, v);
                }
                _ => debug!(header = name.as_str(), "skipping invalid header"),
            }
        }
        headers
    }

    /// Execute a single attempt.
    ///
    /// Non-2xx responses become [`FetchError::http`] with the server's message; failures
    /// before any response become [`FetchError::network`].
    pub async fn send(&self, request: &HttpRequest<'_>) -> std::result::Result<HttpResponse, FetchError> {
        let start = Instant::now();
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(Self::build_headers(request));

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(value.to_string()),
            RequestBody::Text(text) => builder.body(text.clone()),
            RequestBody::Multipart(multipart) => {
                let form = multipart
                    .to_form()
                    .map_err(|e| FetchError::network(e.to_string()))?;
                builder.multipart(form)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;

        let status = response.status().as_u16();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);
        let success = response.status().is_success();

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;

        debug!(
            method = request.method.as_str(),
            url = request.url.as_str(),
            http_status = status,
            duration_ms = start.elapsed().as_millis() as u64,
            "escruta request finished"
        );

        if !success {
            return Err(FetchError::http(status, extract_error_message(&text)));
        }

        let payload = if is_json {
            if text.trim().is_empty() {
                Payload::Json(Value::Null)
            } else {
                let value = serde_json::from_str(&text)
                    .map_err(|e| FetchError::decode(status, format!("invalid JSON body: {}", e)))?;
                Payload::Json(value)
            }
        } else {
            Payload::Text(text)
        };

        Ok(HttpResponse { status, payload })
    }
}

/// Query values follow the browser's string coercion: arrays join their
/// elements with `,` (null elements become empty), objects collapse to a
/// fixed marker.
fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => param_to_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
        other => other.to_string(),
    }
}
