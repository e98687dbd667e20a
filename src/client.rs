//! Fetch client: cached, retried, cancellable requests against the backend.
//!
//! Developer-friendly goal: keep the public surface small and predictable.
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
mod execution;
pub mod fetcher;
pub mod options;
pub mod types;

pub use builder::FetchClientBuilder;
pub use core::FetchClient;
pub use fetcher::{FetchTask, Fetcher};
pub use options::{ErrorCallback, FetchOptions, SuccessCallback};
pub use types::{CancelHandle, FetchMode, FetchState};
