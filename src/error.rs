use crate::error_code::HttpErrorClass;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.base_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "client_config", "token_store")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// What went wrong with a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The server answered with a non-2xx status.
    Http,
    /// No response at all (DNS, refused connection, reset).
    Network,
    /// The response arrived but did not match the expected shape.
    Decode,
}

/// Error surfaced by the fetch layer once retries are exhausted.
///
/// `status` is the HTTP status code, or `0` when the server was never reached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (status {status})")]
pub struct FetchError {
    pub status: u16,
    pub message: String,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            kind: FetchErrorKind::Http,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            message: message.into(),
            kind: FetchErrorKind::Network,
        }
    }

    pub fn decode(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            kind: FetchErrorKind::Decode,
        }
    }

    pub fn class(&self) -> HttpErrorClass {
        match self.kind {
            FetchErrorKind::Network => HttpErrorClass::Network,
            _ => HttpErrorClass::from_http_status(self.status),
        }
    }

    /// Fixed text suitable for an inline error state.
    pub fn user_message(&self) -> &'static str {
        self.class().user_message()
    }

    /// Decode failures are deterministic; retrying them only repeats the work.
    pub(crate) fn is_retryable(&self) -> bool {
        self.kind != FetchErrorKind::Decode
    }
}

/// Unified error type for the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The request was superseded or its owner closed. Never reported through state or callbacks.
    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Authentication error: {message}{}", format_context(.context))]
    Auth {
        message: String,
        context: ErrorContext,
    },

    #[error("Generation job error: {message}")]
    Job { message: String },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new authentication error with structured context
    pub fn auth_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Auth {
            message: msg.into(),
            context,
        }
    }

    pub fn job(msg: impl Into<String>) -> Self {
        Error::Job {
            message: msg.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// The fetch-layer error, if this is one.
    pub fn as_fetch(&self) -> Option<&FetchError> {
        match self {
            Error::Fetch(e) => Some(e),
            _ => None,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Auth { context, .. } => Some(context),
            _ => None,
        }
    }
}
