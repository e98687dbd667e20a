//! 请求缓存模块：有界 LRU 缓存与稳定的缓存键生成。
//!
//! # Request Cache Module
//!
//! A bounded least-recently-used store for GET responses, keyed by a canonical
//! serialization of the request.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RequestCache`] | LRU store with hit/miss/eviction statistics |
//! | [`CacheEntry`] | Cached payload plus the instant it was stored |
//! | [`generate_cache_key`] | `METHOD:endpoint:params:body:data` key derivation |
//! | [`stable_stringify`] | Property-order-independent serialization |
//!
//! ## Example
//!
//! ```rust
//! use escruta_client::cache::{generate_cache_key, CacheEntry, RequestCache, RequestDescriptor};
//! use escruta_client::transport::Payload;
//! use serde_json::json;
//!
//! let cache = RequestCache::new(50);
//! let params = json!({"sort": "recent"});
//! let key = generate_cache_key("/notebooks", &RequestDescriptor::get(Some(&params)));
//! cache.set(key.clone(), CacheEntry::new(Payload::Json(json!([]))));
//! assert!(cache.has(&key));
//! ```
//!
//! The cache is an ordinary value: build one per client (or per test) and share
//! it by `Arc`. Invalidation after mutations goes through
//! [`RequestCache::delete_by_endpoint`] or [`RequestCache::clear`].

mod backend;
mod key;

pub use backend::{CacheEntry, CacheStats, RequestCache};
pub use key::{generate_cache_key, normalize_endpoint, stable_stringify, RequestDescriptor};
