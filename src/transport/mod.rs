//! HTTP transport: request assembly, bearer auth and response decoding.

mod body;
mod http;

pub use body::{
    extract_error_message, MultipartBody, MultipartPart, MultipartValue, Payload, RequestBody,
};
pub use http::{HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Transport error: {0}")]
    Other(String),
}
