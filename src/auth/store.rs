//! Token persistence backends.

use super::token::Token;
use crate::config::AUTH_TOKEN_KEY;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use keyring::Entry;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Where the session token lives between runs.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<Token>>;
    async fn save(&self, token: &Token) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Process-local store, mostly for tests and short-lived tools.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: Token) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<Token>> {
        Ok(self.token.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
    async fn save(&self, token: &Token) -> Result<()> {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        Ok(())
    }
    async fn clear(&self) -> Result<()> {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}

/// JSON file store; the file holds exactly the token object.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `$ESCRUTA_TOKEN_FILE`, else `~/.escruta/token.json`.
    pub fn default_location() -> Self {
        if let Ok(p) = std::env::var("ESCRUTA_TOKEN_FILE") {
            return Self::new(p);
        }
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        Self::new(Path::new(&home).join(".escruta").join("token.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<Token>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                // unreadable file reads as signed out
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring malformed token file");
                Ok(None)
            }
        }
    }

    async fn save(&self, token: &Token) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec(token)?).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// OS keyring store (service `escruta`, entry [`AUTH_TOKEN_KEY`]).
pub struct KeyringTokenStore {
    service: String,
    user: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self {
            service: "escruta".to_string(),
            user: AUTH_TOKEN_KEY.to_string(),
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.user).map_err(|e| keyring_error("open", e))
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

fn keyring_error(op: &str, e: keyring::Error) -> Error {
    Error::auth_with_context(
        format!("keyring {} failed", op),
        ErrorContext::new()
            .with_details(e.to_string())
            .with_source("keyring_token_store"),
    )
}

#[async_trait]
impl TokenStore for KeyringTokenStore {
    async fn load(&self) -> Result<Option<Token>> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(serde_json::from_str(&raw).ok()),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(keyring_error("read", e)),
        }
    }

    async fn save(&self, token: &Token) -> Result<()> {
        let raw = serde_json::to_string(token)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|e| keyring_error("write", e))
    }

    async fn clear(&self) -> Result<()> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(keyring_error("delete", e)),
        }
    }

    fn name(&self) -> &'static str {
        "keyring"
    }
}
