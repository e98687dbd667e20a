//! # escruta-client
//!
//! Escruta 笔记本后端的异步 Rust 客户端：请求缓存、取消、重试与生成任务轮询。
//!
//! Async client for the Escruta notebook backend: cached reads, cancellable and
//! retried requests, and polling of AI generation jobs.
//!
//! ## Overview
//!
//! Every request goes through one [`FetchClient`]. It owns the HTTP transport, a
//! bounded LRU [`RequestCache`] of GET responses and a [`TokenStore`] holding the
//! session token. On top of it:
//!
//! - [`Fetcher`] binds one endpoint to an observable [`FetchState`]; starting a new
//!   fetch aborts the previous one and only the latest may publish
//! - [`GenerationJobPoller`] starts a server-side job and polls it until it is
//!   COMPLETED or FAILED
//! - [`AuthClient`] signs in and out and keeps the token store current
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use escruta_client::models::{endpoints, Notebook};
//! use escruta_client::{FetchClient, FetchOptions};
//!
//! #[tokio::main]
//! async fn main() -> escruta_client::Result<()> {
//!     let client = FetchClient::builder()
//!         .base_url("http://localhost:8080")
//!         .build()?;
//!
//!     let notebooks = client.fetcher(
//!         endpoints::NOTEBOOKS,
//!         FetchOptions::<Vec<Notebook>>::get().retry(2),
//!         false,
//!     );
//!     let list = notebooks.fetch().await?;
//!     println!("{} notebooks", list.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Cache keys and the LRU request cache |
//! | [`client`] | Fetch client, options, stateful fetchers |
//! | [`jobs`] | Generation job types and the poller |
//! | [`auth`] | Token persistence and sign-in flows |
//! | [`transport`] | HTTP plumbing and request/response bodies |
//! | [`models`] | Backend resource shapes and endpoint paths |
//! | [`config`] | Client configuration and defaults |

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error_code;
pub mod jobs;
pub mod models;
pub mod transport;

// Re-export main types for convenience
pub use auth::{AuthClient, FileTokenStore, MemoryTokenStore, Token, TokenStore};
pub use cache::{generate_cache_key, CacheEntry, CacheStats, RequestCache, RequestDescriptor};
pub use client::{
    CancelHandle, FetchClient, FetchClientBuilder, FetchMode, FetchOptions, FetchState, FetchTask,
    Fetcher,
};
pub use config::ClientConfig;
pub use error_code::HttpErrorClass;
pub use jobs::{GenerationJob, GenerationJobPoller, JobOptions, JobState, JobStatus, JobType};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, FetchError, FetchErrorKind};
