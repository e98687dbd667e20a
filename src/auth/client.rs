use super::token::Token;
use crate::client::{FetchClient, FetchOptions};
use crate::error::FetchError;
use crate::models::{endpoints, User};
use crate::transport::{HttpRequest, RequestBody};
use crate::{Error, Result};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// Body returned by `login` and `register`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Outcome of a sign-in or sign-up call.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOutcome {
    pub status: u16,
    pub data: AuthResponse,
    /// Fetched right after a token was stored.
    pub user: Option<User>,
}

/// Session management on top of a [`FetchClient`] and its token store.
#[derive(Clone)]
pub struct AuthClient {
    client: FetchClient,
}

impl AuthClient {
    pub fn new(client: FetchClient) -> Self {
        Self { client }
    }

    /// Sign in; any successful response carrying a token starts a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome> {
        let body = json!({ "email": email, "password": password });
        let (status, data) = self.post_unauthenticated(endpoints::LOGIN, body).await?;
        self.finish_sign_in(status, data, true).await
    }

    /// Sign up; a session starts only on `201 Created`.
    pub async fn register(&self, email: &str, password: &str, full_name: &str) -> Result<AuthOutcome> {
        let body = json!({ "email": email, "password": password, "fullName": full_name });
        let (status, data) = self.post_unauthenticated(endpoints::REGISTER, body).await?;
        let created = status == StatusCode::CREATED.as_u16();
        self.finish_sign_in(status, data, created).await
    }

    /// Forget the session and every cached read made with it.
    pub async fn logout(&self) -> Result<()> {
        self.client.token_store().clear().await?;
        self.client.clear_cache(None);
        info!("signed out");
        Ok(())
    }

    /// `None` when signed out.
    pub async fn current_user(&self) -> Result<Option<User>> {
        if !self.is_authenticated().await {
            return Ok(None);
        }
        let options = FetchOptions::<User>::get().skip_cache(true);
        self.client.request(endpoints::CURRENT_USER, &options).await.map(Some)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.client
            .current_token()
            .await
            .map(|t| t.bearer().is_some())
            .unwrap_or(false)
    }

    pub async fn check_token_validity(&self) -> bool {
        self.client
            .current_token()
            .await
            .map(|t| t.is_valid())
            .unwrap_or(false)
    }

    async fn finish_sign_in(&self, status: u16, data: AuthResponse, store: bool) -> Result<AuthOutcome> {
        let mut user = None;
        if let (true, Some(token)) = (store, data.token.as_deref().filter(|t| !t.is_empty())) {
            let token = Token::issued_now(token, data.expires_in.unwrap_or(0));
            self.client.token_store().save(&token).await?;
            info!(http_status = status, "session started");
            user = match self.current_user().await {
                Ok(u) => u,
                Err(e) => {
                    warn!(error = %e, "signed in but could not load the user profile");
                    None
                }
            };
        }
        Ok(AuthOutcome { status, data, user })
    }

    /// Credentials go out without a bearer header and without retries.
    async fn post_unauthenticated(&self, endpoint: &str, body: serde_json::Value) -> Result<(u16, AuthResponse)> {
        let transport = self.client.transport();
        let body = RequestBody::Json(body);
        let request = HttpRequest {
            method: Method::POST,
            url: transport.resolve_url(None, endpoint, None)?,
            headers: &[],
            body: &body,
            bearer: None,
        };
        match transport.send(&request).await {
            Ok(response) => {
                let data = response.payload.decode::<AuthResponse>().unwrap_or_default();
                Ok((response.status, data))
            }
            Err(e) => Err(Error::Fetch(with_reason_phrase(e))),
        }
    }
}

fn with_reason_phrase(mut e: FetchError) -> FetchError {
    if e.message.trim().is_empty() {
        if let Some(reason) = StatusCode::from_u16(e.status).ok().and_then(|s| s.canonical_reason()) {
            e.message = reason.to_string();
        }
    }
    e
}
