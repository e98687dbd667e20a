use serde::{Deserialize, Serialize};

/// Persisted session token, stored in the same shape the web client keeps in its cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub token: Option<String>,
    /// Lifetime in milliseconds.
    #[serde(default)]
    pub expires_in: u64,
    /// Creation time in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Token {
    pub fn issued_now(token: impl Into<String>, expires_in: u64) -> Self {
        Self {
            token: Some(token.into()),
            expires_in,
            created_at: Some(chrono::Utc::now().timestamp_millis()),
        }
    }

    /// The signed-out token.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Non-empty token string, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// Valid only when token, lifetime and creation time are all present and unexpired at `now_ms`.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        match (self.bearer(), self.expires_in, self.created_at) {
            (Some(_), expires_in, Some(created_at)) if expires_in > 0 => {
                now_ms.saturating_sub(created_at) < expires_in as i64
            }
            _ => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(chrono::Utc::now().timestamp_millis())
    }
}
