//! Cache key generation.

use reqwest::Method;
use serde_json::Value;

/// The parts of a request that identify a cached read.
#[derive(Debug, Clone)]
pub struct RequestDescriptor<'a> {
    pub method: &'a Method,
    pub params: Option<&'a Value>,
    pub body: Option<&'a Value>,
    pub data: Option<&'a Value>,
}

static GET: Method = Method::GET;

impl<'a> RequestDescriptor<'a> {
    pub fn get(params: Option<&'a Value>) -> Self {
        Self {
            method: &GET,
            params,
            body: None,
            data: None,
        }
    }
}

/// Strip leading slashes so `/notebooks` and `notebooks` address the same entries.
pub fn normalize_endpoint(endpoint: &str) -> &str {
    endpoint.trim_start_matches('/')
}

/// Serialize a value so that object property order never affects the output.
///
/// Absent values render as `undefined`, top-level primitives as their plain text,
/// containers as JSON with keys sorted at every depth.
pub fn stable_stringify(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(v) => {
            let mut out = String::new();
            write_canonical(v, &mut out);
            out
        }
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // serializing a plain string cannot fail
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Build the canonical `METHOD:endpoint:params:body:data` key.
pub fn generate_cache_key(endpoint: &str, request: &RequestDescriptor<'_>) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        request.method.as_str(),
        normalize_endpoint(endpoint),
        stable_stringify(request.params),
        stable_stringify(request.body),
        stable_stringify(request.data),
    )
}

/// Whether `key` belongs to `endpoint` or to a resource nested under it.
///
/// Endpoints may themselves contain `:`, so the key is matched from the front:
/// `METHOD:` then the endpoint, then `:` (next fragment), `/` or `?`.
pub(crate) fn key_matches_endpoint(key: &str, endpoint: &str) -> bool {
    let wanted = normalize_endpoint(endpoint);
    let Some((_, rest)) = key.split_once(':') else {
        return false;
    };
    if wanted.is_empty() {
        return true;
    }
    match rest.strip_prefix(wanted) {
        Some(tail) => tail.starts_with([':', '/', '?']),
        None => false,
    }
}
