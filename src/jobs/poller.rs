//! Generation job poller: start a server-side job, then poll it until it finishes.

use super::types::{GenerationJob, JobOptions, JobStarted, JobState, JobStatus, JobType};
use crate::client::{FetchClient, FetchOptions};
use crate::error::ErrorContext;
use crate::models::endpoints;
use crate::{Error, Result};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

const MIN_POLLING_INTERVAL: Duration = Duration::from_millis(1);

/// The running poll loop.
#[derive(Clone)]
struct PollTicket {
    id: u64,
    job_id: String,
    token: CancellationToken,
}

struct Inner {
    client: FetchClient,
    notebook_id: String,
    job_type: JobType,
    options: JobOptions,
    state: watch::Sender<JobState>,
    polling: Mutex<Option<PollTicket>>,
    next_ticket: AtomicU64,
    /// Bumped by `start_generation` and `reset`; a latest-job lookup that started
    /// under an older epoch is discarded.
    epoch: AtomicU64,
    lifetime: CancellationToken,
}

fn lock<M>(m: &Mutex<M>) -> MutexGuard<'_, M> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Observes one `(notebook, job type)` pair.
///
/// Construction looks up the latest job once; a job that is still running is
/// picked up by the poll loop. At most one poll loop runs at a time and it stops
/// for good on COMPLETED or FAILED. Per-tick request failures are logged and the
/// loop keeps going.
///
/// Clones share state. Background work never keeps the poller alive: dropping
/// the last clone closes it, and no state change or callback follows.
#[derive(Clone)]
pub struct GenerationJobPoller {
    inner: Arc<Inner>,
    _guard: Arc<DropGuard>,
}

impl GenerationJobPoller {
    /// Must run inside a tokio runtime; the latest-job lookup is spawned at once.
    pub fn new(
        client: FetchClient,
        notebook_id: impl Into<String>,
        job_type: JobType,
        options: JobOptions,
    ) -> Self {
        let (state, _) = watch::channel(JobState::default());
        let lifetime = CancellationToken::new();
        let poller = Self {
            _guard: Arc::new(lifetime.clone().drop_guard()),
            inner: Arc::new(Inner {
                client,
                notebook_id: notebook_id.into(),
                job_type,
                options,
                state,
                polling: Mutex::new(None),
                next_ticket: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                lifetime,
            }),
        };
        let inner = poller.inner.clone();
        tokio::spawn(async move {
            if let Err(e) = Inner::lookup_latest(&inner).await {
                debug!(error = %e, "no previous generation job picked up");
            }
        });
        poller
    }

    pub fn notebook_id(&self) -> &str {
        &self.inner.notebook_id
    }

    pub fn job_type(&self) -> JobType {
        self.inner.job_type
    }

    pub fn state(&self) -> JobState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.inner.state.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.inner.polling)
            .as_ref()
            .is_some_and(|t| !t.token.is_cancelled())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lifetime.is_cancelled()
    }

    /// Look up the latest job of this type again, bypassing the cache.
    ///
    /// A found job replaces the current one unless a generation was started or the
    /// poller reset while the lookup was in flight.
    pub async fn refetch(&self) -> Result<Option<GenerationJob>> {
        Inner::lookup_latest(&self.inner).await
    }

    /// Ask the server for a new job and start polling it.
    ///
    /// Without a session this fails with "Not authenticated" and nothing is sent.
    /// A rejected request leaves its message in [`JobState::error`].
    pub async fn start_generation(&self) -> Result<JobStarted> {
        let inner = &self.inner;
        if !self.has_session().await {
            inner
                .state
                .send_modify(|s| s.error = Some("Not authenticated".to_string()));
            return Err(Error::auth_with_context(
                "Not authenticated",
                ErrorContext::new().with_source("generation_job"),
            ));
        }

        inner.state.send_modify(|s| {
            s.is_starting = true;
            s.error = None;
        });

        let endpoint = endpoints::generate(&inner.notebook_id);
        let options = FetchOptions::<JobStarted>::post()
            .json(json!({ "type": inner.job_type }))
            .skip_cache(true);
        let outcome = inner
            .client
            .fetch_with_retry(&endpoint, &options, &inner.lifetime)
            .await;

        let mut slot = lock(&inner.polling);
        if inner.lifetime.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match outcome {
            Ok(started) => {
                inner.epoch.fetch_add(1, Ordering::SeqCst);
                let job = GenerationJob::pending(&started.job_id, &inner.notebook_id, inner.job_type);
                inner.state.send_modify(|s| {
                    s.job = Some(job);
                    s.is_starting = false;
                });
                info!(
                    notebook_id = inner.notebook_id.as_str(),
                    job_type = inner.job_type.as_str(),
                    job_id = started.job_id.as_str(),
                    "generation started"
                );
                Inner::start_polling(inner, &mut slot, started.job_id.clone());
                Ok(started)
            }
            Err(Error::Fetch(e)) => {
                let message = if e.message.trim().is_empty() {
                    "Failed to start generation".to_string()
                } else {
                    e.message.clone()
                };
                warn!(
                    notebook_id = inner.notebook_id.as_str(),
                    job_type = inner.job_type.as_str(),
                    http_status = e.status,
                    error = message.as_str(),
                    "generation could not be started"
                );
                inner.state.send_modify(|s| {
                    s.is_starting = false;
                    s.error = Some(message);
                });
                Err(Error::Fetch(e))
            }
            Err(other) => {
                inner.state.send_modify(|s| s.is_starting = false);
                Err(other)
            }
        }
    }

    /// Stop polling and forget the local job and error. Server records are untouched.
    pub fn reset(&self) {
        let mut slot = lock(&self.inner.polling);
        if let Some(ticket) = slot.take() {
            ticket.token.cancel();
        }
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.state.send_modify(|s| {
            s.job = None;
            s.error = None;
        });
    }

    /// Stop polling for good. State stays readable but never changes again.
    pub fn close(&self) {
        self.inner.lifetime.cancel();
        lock(&self.inner.polling).take();
    }

    /// Resolve once the current job reaches a terminal status.
    ///
    /// Fails when there is no job to wait for or the poller is closed first.
    pub async fn wait_until_finished(&self) -> Result<GenerationJob> {
        let mut rx = self.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                match &state.job {
                    Some(job) if job.status.is_terminal() => return Ok(job.clone()),
                    None if !state.is_starting => {
                        let message = state
                            .error
                            .clone()
                            .unwrap_or_else(|| "no generation job to wait for".to_string());
                        return Err(Error::job(message));
                    }
                    _ => {}
                }
            }
            tokio::select! {
                biased;
                _ = self.inner.lifetime.cancelled() => return Err(Error::Cancelled),
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(Error::Cancelled);
                    }
                }
            }
        }
    }

    async fn has_session(&self) -> bool {
        self.inner
            .client
            .current_token()
            .await
            .is_some_and(|t| t.bearer().is_some())
    }
}

async fn poll_loop(inner: Weak<Inner>, ticket: PollTicket, interval: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = ticket.token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(strong) = inner.upgrade() else { break };
        match strong.poll_once(&ticket).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(Error::Cancelled) => break,
            Err(e) => warn!(
                job_id = ticket.job_id.as_str(),
                error = %e,
                "error polling job status"
            ),
        }
    }
    debug!(job_id = ticket.job_id.as_str(), "poll loop stopped");
}

impl Inner {
    /// Latest-job lookup shared by construction and `refetch`.
    async fn lookup_latest(inner: &Arc<Self>) -> Result<Option<GenerationJob>> {
        let epoch = inner.epoch.load(Ordering::SeqCst);
        let endpoint = endpoints::latest_job(&inner.notebook_id, inner.job_type);
        let options = FetchOptions::<Option<GenerationJob>>::get().skip_cache(true);
        let latest = tokio::select! {
            biased;
            _ = inner.lifetime.cancelled() => return Err(Error::Cancelled),
            r = inner.client.request(&endpoint, &options) => r?,
        };
        if let Some(job) = &latest {
            Self::adopt(inner, job.clone(), epoch);
        }
        Ok(latest)
    }

    /// Take over a job found by the latest-job lookup.
    fn adopt(inner: &Arc<Self>, job: GenerationJob, epoch: u64) {
        let mut slot = lock(&inner.polling);
        if inner.lifetime.is_cancelled() || inner.epoch.load(Ordering::SeqCst) != epoch {
            debug!(job_id = job.id.as_str(), "latest job lookup superseded");
            return;
        }
        let running = !job.status.is_terminal();
        let job_id = job.id.clone();
        inner.state.send_modify(|s| s.job = Some(job));
        let already_polling = slot
            .as_ref()
            .is_some_and(|t| t.job_id == job_id && !t.token.is_cancelled());
        if running && !already_polling {
            debug!(job_id = job_id.as_str(), "resuming unfinished job");
            Self::start_polling(inner, &mut slot, job_id);
        }
    }

    /// Replace the poll loop. Caller holds the polling lock.
    fn start_polling(inner: &Arc<Self>, slot: &mut Option<PollTicket>, job_id: String) {
        let ticket = PollTicket {
            id: inner.next_ticket.fetch_add(1, Ordering::Relaxed),
            job_id,
            token: inner.lifetime.child_token(),
        };
        if let Some(previous) = slot.replace(ticket.clone()) {
            previous.token.cancel();
        }
        let interval = inner.options.polling_interval.max(MIN_POLLING_INTERVAL);
        tokio::spawn(poll_loop(Arc::downgrade(inner), ticket, interval));
    }

    /// One poll tick. `Ok(true)` once the job is terminal.
    async fn poll_once(&self, ticket: &PollTicket) -> Result<bool> {
        let signed_in = self
            .client
            .current_token()
            .await
            .is_some_and(|t| t.bearer().is_some());
        if !signed_in {
            debug!(job_id = ticket.job_id.as_str(), "no session, skipping poll tick");
            return Ok(false);
        }

        let endpoint = endpoints::job(&self.notebook_id, &ticket.job_id);
        let options = FetchOptions::<GenerationJob>::get()
            .skip_cache(true)
            .cache_time(Duration::ZERO);
        let job = self
            .client
            .fetch_with_retry(&endpoint, &options, &ticket.token)
            .await?;

        let status = job.status;
        {
            let mut slot = lock(&self.polling);
            if ticket.token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let failure = (status == JobStatus::Failed).then(|| job.failure_message());
            let snapshot = job.clone();
            self.state.send_modify(|s| {
                s.job = Some(snapshot);
                if let Some(message) = failure {
                    s.error = Some(message);
                }
            });
            if status.is_terminal() {
                ticket.token.cancel();
                if slot.as_ref().map(|t| t.id) == Some(ticket.id) {
                    *slot = None;
                }
            }
        }

        if self.lifetime.is_cancelled() {
            return Ok(true);
        }
        match status {
            JobStatus::Completed => {
                info!(job_id = job.id.as_str(), "generation completed");
                if let Some(cb) = &self.options.on_completed {
                    cb(&job);
                }
            }
            JobStatus::Failed => {
                warn!(
                    job_id = job.id.as_str(),
                    error = job.failure_message().as_str(),
                    "generation failed"
                );
                if let Some(cb) = &self.options.on_failed {
                    cb(&job);
                }
            }
            _ => debug!(job_id = job.id.as_str(), status = ?status, "job still running"),
        }
        Ok(status.is_terminal())
    }
}
