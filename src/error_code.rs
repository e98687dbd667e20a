//! HTTP 错误分类：把状态码映射为稳定的错误类别与用户可读提示。
//!
//! HTTP error classes.
//!
//! The backend's status code is authoritative for error classification. Each
//! class carries the fixed, user-facing text shown in inline error states.
//!
//! ## Example
//!
//! ```rust
//! use escruta_client::error_code::HttpErrorClass;
//!
//! let class = HttpErrorClass::from_http_status(401);
//! assert_eq!(class, HttpErrorClass::Unauthorized);
//! assert_eq!(class.user_message(), "Authentication failed. Please sign in again.");
//! assert!(!class.is_retryable());
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpErrorClass {
    /// 400
    BadRequest,
    /// 401: missing, invalid or expired session
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 429
    RateLimited,
    /// 500
    ServerError,
    /// 502 / 503
    Unavailable,
    /// No response (status 0)
    Network,
    /// Anything else
    Other,
}

impl HttpErrorClass {
    pub fn from_http_status(status: u16) -> Self {
        match status {
            0 => Self::Network,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500 => Self::ServerError,
            502 | 503 => Self::Unavailable,
            _ => Self::Other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Unavailable => "unavailable",
            Self::Network => "network",
            Self::Other => "other",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest => "Bad request. Please check your input.",
            Self::Unauthorized => "Authentication failed. Please sign in again.",
            Self::Forbidden => {
                "Access denied. You don't have permission to perform this action."
            }
            Self::NotFound => "Resource not found.",
            Self::RateLimited => "Too many requests. Please try again later.",
            Self::ServerError => "Internal server error. Please try again later.",
            Self::Unavailable => "Service temporarily unavailable. Please try again later.",
            Self::Network | Self::Other => {
                "An unexpected error occurred. Please try again later."
            }
        }
    }

    /// Informational only: the fetch layer retries every failure the caller asks it to.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::Unavailable | Self::Network
        )
    }
}

impl fmt::Display for HttpErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
