//! 认证模块：会话令牌的持久化与登录/注册/登出。
//!
//! Session token persistence and sign-in flows.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Token`] | The persisted `{token, expiresIn, createdAt}` record |
//! | [`TokenStore`] | Trait for token persistence backends |
//! | [`MemoryTokenStore`] | In-process store (tests, short-lived tools) |
//! | [`FileTokenStore`] | JSON file store |
//! | [`KeyringTokenStore`] | OS keyring store |
//! | [`AuthClient`] | Login, register, logout and current-user lookups |
//!
//! The fetch layer only reads the store: a missing or empty token still sends the
//! request, unauthenticated, and the backend decides.

mod client;
mod store;
mod token;

pub use client::{AuthClient, AuthOutcome, AuthResponse};
pub use store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use token::Token;
