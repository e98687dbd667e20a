//! Request and response bodies.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// What a request carries. Multipart stays a plain description so every retry
/// can rebuild a fresh form.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized as JSON with `Content-Type: application/json`.
    Json(Value),
    /// Sent unmodified.
    Text(String),
    /// Sent as `multipart/form-data` with its own boundary header.
    Multipart(MultipartBody),
}

impl RequestBody {
    pub fn json<T: serde::Serialize>(value: &T) -> crate::Result<Self> {
        Ok(RequestBody::Json(serde_json::to_value(value)?))
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }

    /// `(body, data)` fragments for cache keys: raw text is the body, structured payloads the data.
    pub(crate) fn cache_fragments(&self) -> (Option<Value>, Option<Value>) {
        match self {
            RequestBody::Empty => (None, None),
            RequestBody::Json(v) => (None, Some(v.clone())),
            RequestBody::Text(s) => (Some(Value::String(s.clone())), None),
            RequestBody::Multipart(m) => (None, Some(m.describe())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultipartValue {
    Text(String),
    File {
        filename: String,
        content: Bytes,
        mime: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultipartPart {
    pub name: String,
    pub value: MultipartValue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartBody {
    pub parts: Vec<MultipartPart>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart {
            name: name.into(),
            value: MultipartValue::Text(value.into()),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<Bytes>,
        mime: Option<&str>,
    ) -> Self {
        self.parts.push(MultipartPart {
            name: name.into(),
            value: MultipartValue::File {
                filename: filename.into(),
                content: content.into(),
                mime: mime.map(str::to_string),
            },
        });
        self
    }

    pub fn into_body(self) -> RequestBody {
        self.into()
    }

    pub(crate) fn to_form(&self) -> Result<reqwest::multipart::Form, reqwest::Error> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match &part.value {
                MultipartValue::Text(text) => form.text(part.name.clone(), text.clone()),
                MultipartValue::File {
                    filename,
                    content,
                    mime,
                } => {
                    let mut p = reqwest::multipart::Part::bytes(content.to_vec())
                        .file_name(filename.clone());
                    if let Some(m) = mime {
                        p = p.mime_str(m)?;
                    }
                    form.part(part.name.clone(), p)
                }
            };
        }
        Ok(form)
    }

    fn describe(&self) -> Value {
        let parts: Vec<Value> = self
            .parts
            .iter()
            .map(|p| match &p.value {
                MultipartValue::Text(t) => json!({"name": p.name, "text": t}),
                MultipartValue::File {
                    filename, content, ..
                } => json!({"name": p.name, "file": filename, "size": content.len()}),
            })
            .collect();
        Value::Array(parts)
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    /// Text bodies become JSON strings, so `String` targets accept either form.
    pub fn into_value(self) -> Value {
        match self {
            Payload::Json(v) => v,
            Payload::Text(s) => Value::String(s),
        }
    }

    pub fn decode<T: DeserializeOwned>(self) -> serde_json::Result<T> {
        serde_json::from_value(self.into_value())
    }
}

/// Prefer a JSON `message`, then `detail`, then the raw text.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for field in ["message", "detail"] {
            match map.get(field) {
                Some(Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(v) if !v.is_null() && !v.is_string() => return v.to_string(),
                _ => {}
            }
        }
    }
    body.to_string()
}

impl From<MultipartBody> for RequestBody {
    fn from(body: MultipartBody) -> Self {
        RequestBody::Multipart(body)
    }
}
