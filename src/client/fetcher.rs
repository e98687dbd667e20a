//! Stateful fetcher: one endpoint, one published state, at most one request in flight.

use super::core::FetchClient;
use super::options::FetchOptions;
use super::types::{CancelHandle, FetchMode, FetchState};
use crate::cache::{normalize_endpoint, stable_stringify};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

struct RequestSpec<T> {
    endpoint: String,
    options: FetchOptions<T>,
}

impl<T> RequestSpec<T> {
    /// Endpoint, method and params; changing any of them re-runs an immediate fetcher.
    fn dependency_key(&self) -> String {
        format!(
            "{}|{}|{}",
            normalize_endpoint(&self.endpoint),
            self.options.method.as_str(),
            stable_stringify(self.options.params.as_ref())
        )
    }
}

/// A claim on the in-flight slot.
#[derive(Clone)]
struct Ticket {
    id: u64,
    token: CancellationToken,
}

struct Inner<T> {
    client: FetchClient,
    request: Mutex<RequestSpec<T>>,
    immediate: bool,
    state: watch::Sender<FetchState<T>>,
    inflight: Mutex<Option<Ticket>>,
    next_ticket: AtomicU64,
    lifetime: CancellationToken,
}

/// Fetches one endpoint and publishes a [`FetchState`] snapshot.
///
/// - starting a fetch aborts the previous in-flight one; only the latest may commit
/// - aborted requests never update state or fire callbacks
/// - after [`Fetcher::close`] nothing is committed any more
///
/// Clones share the same state and in-flight slot. Dropping the last clone
/// closes the fetcher, so a request still in flight never commits.
pub struct Fetcher<T> {
    inner: Arc<Inner<T>>,
    _guard: Arc<DropGuard>,
}

impl<T> Clone for Fetcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _guard: self._guard.clone(),
        }
    }
}

/// A spawned fetch and the handle that aborts it.
pub struct FetchTask<T> {
    handle: JoinHandle<Result<T>>,
    cancel: CancelHandle,
}

impl<T> FetchTask<T> {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub async fn join(self) -> Result<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(Error::Cancelled),
        }
    }
}

fn lock<M>(m: &Mutex<M>) -> MutexGuard<'_, M> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl<T> Fetcher<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// With `immediate`, the initial state is loading and the first fetch is spawned at once,
    /// so this must run inside a tokio runtime.
    pub fn new(
        client: FetchClient,
        endpoint: impl Into<String>,
        options: FetchOptions<T>,
        immediate: bool,
    ) -> Self {
        let initial = if immediate {
            FetchState::pending()
        } else {
            FetchState::idle()
        };
        let (state, _) = watch::channel(initial);
        let lifetime = CancellationToken::new();
        let fetcher = Self {
            _guard: Arc::new(lifetime.clone().drop_guard()),
            inner: Arc::new(Inner {
                client,
                request: Mutex::new(RequestSpec {
                    endpoint: endpoint.into(),
                    options,
                }),
                immediate,
                state,
                inflight: Mutex::new(None),
                next_ticket: AtomicU64::new(0),
                lifetime,
            }),
        };
        if immediate {
            Inner::spawn(&fetcher.inner, FetchMode::default());
        }
        fetcher
    }

    pub fn state(&self) -> FetchState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.inner.state.subscribe()
    }

    pub fn endpoint(&self) -> String {
        lock(&self.inner.request).endpoint.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lifetime.is_cancelled()
    }

    /// Fetch with default mode (cache allowed, loading shown).
    pub async fn fetch(&self) -> Result<T> {
        self.inner.run(self.inner.begin(), FetchMode::default()).await
    }

    /// Manual re-run; `force` bypasses the cache.
    pub async fn refetch(&self, force: bool) -> Result<T> {
        self.refetch_with(FetchMode {
            force,
            show_loading: true,
        })
        .await
    }

    pub async fn refetch_with(&self, mode: FetchMode) -> Result<T> {
        self.inner.run(self.inner.begin(), mode).await
    }

    /// Spawn a fetch and hand back its own cancel handle.
    pub fn start(&self, mode: FetchMode) -> FetchTask<T> {
        let ticket = self.inner.begin();
        let cancel = CancelHandle::new(ticket.token.clone());
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move { inner.run(ticket, mode).await });
        FetchTask { handle, cancel }
    }

    /// Swap endpoint and options. An immediate fetcher re-fetches when endpoint, method or params changed.
    pub fn set_request(&self, endpoint: impl Into<String>, options: FetchOptions<T>) {
        let changed = {
            let mut current = lock(&self.inner.request);
            let before = current.dependency_key();
            current.endpoint = endpoint.into();
            current.options = options;
            before != current.dependency_key()
        };
        if changed && self.inner.immediate && !self.is_closed() {
            debug!(endpoint = self.endpoint().as_str(), "request changed, re-fetching");
            Inner::spawn(&self.inner, FetchMode::default());
        }
    }

    /// Abort the in-flight request, if any. State is left as it was.
    pub fn cancel(&self) {
        if let Some(ticket) = lock(&self.inner.inflight).take() {
            ticket.token.cancel();
        }
    }

    /// Tear down: abort in-flight work and never commit again.
    pub fn close(&self) {
        self.inner.lifetime.cancel();
        lock(&self.inner.inflight).take();
    }

    /// Handle equivalent to [`Fetcher::close`], for owners that only keep the handle.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(self.inner.lifetime.clone())
    }
}

impl<T> Inner<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// The task holds `Inner` only, never a user handle, so dropping the
    /// fetcher still cancels it.
    fn spawn(this: &Arc<Self>, mode: FetchMode) {
        let ticket = this.begin();
        let inner = this.clone();
        tokio::spawn(async move {
            // failures are already published through state
            if let Err(e) = inner.run(ticket, mode).await {
                debug!(error = %e, "background fetch ended without data");
            }
        });
    }

    /// Claim the in-flight slot, aborting whoever held it.
    fn begin(&self) -> Ticket {
        let ticket = Ticket {
            id: self.next_ticket.fetch_add(1, Ordering::Relaxed),
            token: self.lifetime.child_token(),
        };
        if let Some(previous) = lock(&self.inflight).replace(ticket.clone()) {
            previous.token.cancel();
        }
        ticket
    }

    /// Publish `next` unless the request was superseded or the fetcher closed.
    fn commit(
        &self,
        token: &CancellationToken,
        next: impl FnOnce(&FetchState<T>) -> FetchState<T>,
    ) -> bool {
        let _slot = lock(&self.inflight);
        if token.is_cancelled() {
            return false;
        }
        self.state.send_modify(|state| *state = next(state));
        true
    }

    async fn run(&self, ticket: Ticket, mode: FetchMode) -> Result<T> {
        let result = self.run_inner(&ticket.token, mode).await;
        let mut slot = lock(&self.inflight);
        if slot.as_ref().map(|t| t.id) == Some(ticket.id) {
            *slot = None;
        }
        result
    }

    async fn run_inner(&self, token: &CancellationToken, mode: FetchMode) -> Result<T> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let (endpoint, options) = {
            let current = lock(&self.request);
            (current.endpoint.clone(), current.options.clone())
        };
        let client = &self.client;

        if let Some(data) = client.cached(&endpoint, &options, mode.force) {
            if !self.commit(token, |_| FetchState::ready(data.clone())) {
                return Err(Error::Cancelled);
            }
            options.notify_success(&data);
            return Ok(data);
        }

        if mode.show_loading {
            self.commit(token, |prev| FetchState {
                data: prev.data.clone(),
                loading: true,
                error: None,
            });
        }

        match client.fetch_with_retry(&endpoint, &options, token).await {
            Ok(data) => {
                if !self.commit(token, |_| FetchState::ready(data.clone())) {
                    return Err(Error::Cancelled);
                }
                options.notify_success(&data);
                Ok(data)
            }
            Err(Error::Fetch(e)) => {
                if !self.commit(token, |_| FetchState::failed(e.clone())) {
                    return Err(Error::Cancelled);
                }
                options.notify_error(&e);
                Err(Error::Fetch(e))
            }
            Err(other) => Err(other),
        }
    }
}
