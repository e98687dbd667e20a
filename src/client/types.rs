use crate::error::FetchError;
use tokio_util::sync::CancellationToken;

/// Snapshot of a fetcher's observable state. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<FetchError>,
}

impl<T> FetchState<T> {
    pub fn idle() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }

    pub fn pending() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
        }
    }

    pub fn ready(data: T) -> Self {
        Self {
            data: Some(data),
            loading: false,
            error: None,
        }
    }

    pub fn failed(error: FetchError) -> Self {
        Self {
            data: None,
            loading: false,
            error: Some(error),
        }
    }
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

/// How a single fetch treats the cache and the loading flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchMode {
    /// Bypass the cache for this call.
    pub force: bool,
    /// Publish `loading: true` while the request is in flight.
    pub show_loading: bool,
}

impl FetchMode {
    pub fn forced() -> Self {
        Self {
            force: true,
            show_loading: true,
        }
    }

    /// Refresh in the background, keeping the current state visible.
    pub fn silent() -> Self {
        Self {
            force: false,
            show_loading: false,
        }
    }
}

impl Default for FetchMode {
    fn default() -> Self {
        Self {
            force: false,
            show_loading: true,
        }
    }
}

/// Handle that cancels a request (or every request of a closed owner).
///
/// Cancelling is idempotent; a cancelled request never touches state or callbacks.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
