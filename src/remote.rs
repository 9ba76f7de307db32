//! Remote backend clients — HTTP implementations of the collaborator traits.
//!
//! DESIGN
//! ======
//! The hosted backend exposes a token-grant auth API (`/auth/v1/...`) and a
//! rows REST API (`/rest/v1/...`), both keyed by a public API key. Thin
//! wrappers around `reqwest` with pure `parse_*` functions so decoding is
//! testable without a server. The session store mirrors the provider's
//! notification semantics by emitting an [`AuthChange`] after each
//! successful call.

use serde::Deserialize;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::config::RemoteConfig;
use crate::error::AuthError;
use crate::profile::{Profile, ProfilePatch};
use crate::session::{AuthChange, AuthUser, Session};
use crate::store::{ProfileRepository, SessionStore};

const EVENT_CHANNEL_CAPACITY: usize = 16;

fn build_http(config: &RemoteConfig) -> Result<reqwest::Client, AuthError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|e| AuthError::HttpClientBuild(e.to_string()))
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// [`SessionStore`] backed by the hosted identity provider's REST API.
pub struct RemoteSessionStore {
    http: reqwest::Client,
    config: RemoteConfig,
    events: broadcast::Sender<AuthChange>,
    current: RwLock<Option<Session>>,
}

impl RemoteSessionStore {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: RemoteConfig) -> Result<Self, AuthError> {
        let http = build_http(&config)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self { http, config, events, current: RwLock::new(None) })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.config.base_url)
    }

    async fn post_auth(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<(u16, String), AuthError> {
        let mut request = self
            .http
            .post(self.auth_url(path))
            .header("apikey", &self.config.api_key)
            .json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| AuthError::ApiRequest(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| AuthError::ApiRequest(e.to_string()))?;
        Ok((status, text))
    }

    fn emit(&self, event: AuthChange) {
        let _ = self.events.send(event);
    }

    /// Exchange the refresh token for a new access token. Emits
    /// `TokenRefreshed` for the same identity on success.
    ///
    /// # Errors
    ///
    /// Returns an error if no session is held or the grant fails.
    pub async fn refresh_session(&self) -> Result<(), AuthError> {
        let refresh_token = {
            let current = self.current.read().await;
            current
                .as_ref()
                .map(|s| s.refresh_token.clone())
                .ok_or_else(|| AuthError::ApiRequest("no session to refresh".into()))?
        };
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let (status, text) = self
            .post_auth("token?grant_type=refresh_token", None, &body)
            .await?;
        if status != 200 {
            return Err(AuthError::ApiResponse { status, body: text });
        }
        let session = parse_token_grant(&text)?;
        *self.current.write().await = Some(session.clone());
        self.emit(AuthChange::TokenRefreshed(session));
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionStore for RemoteSessionStore {
    async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<(), AuthError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "data": { "display_name": display_name },
        });
        let (status, text) = self.post_auth("signup", None, &body).await?;
        match status {
            200 => Ok(()),
            400 | 422 => Err(AuthError::SignUpRejected(text)),
            _ => Err(AuthError::ApiResponse { status, body: text }),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let (status, text) = self.post_auth("token?grant_type=password", None, &body).await?;
        match status {
            200 => {
                let session = parse_token_grant(&text)?;
                *self.current.write().await = Some(session.clone());
                self.emit(AuthChange::SignedIn(session));
                Ok(())
            }
            400 | 401 => Err(AuthError::InvalidCredentials),
            _ => Err(AuthError::ApiResponse { status, body: text }),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // Drop the local session and notify before the network call: a dead
        // connection on logout must not keep the app signed in.
        let taken = self.current.write().await.take();
        self.emit(AuthChange::SignedOut);
        let Some(session) = taken else {
            return Ok(());
        };
        let (status, text) = self
            .post_auth("logout", Some(&session.access_token), &serde_json::json!({}))
            .await?;
        match status {
            200 | 204 => Ok(()),
            _ => Err(AuthError::ApiResponse { status, body: text }),
        }
    }

    async fn current_session(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}

// =============================================================================
// PROFILE REPOSITORY
// =============================================================================

/// [`ProfileRepository`] backed by the backend's rows REST API.
///
/// Requests carry the public API key; when an access token is set via
/// [`RemoteProfileRepository::set_access_token`] it is sent as the bearer so
/// row-level security sees the signed-in user.
pub struct RemoteProfileRepository {
    http: reqwest::Client,
    config: RemoteConfig,
    access_token: RwLock<Option<String>>,
}

impl RemoteProfileRepository {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: RemoteConfig) -> Result<Self, AuthError> {
        let http = build_http(&config)?;
        Ok(Self { http, config, access_token: RwLock::new(None) })
    }

    /// Set or clear the bearer token used for row-level security.
    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    fn rows_url(&self, id: Uuid) -> String {
        format!("{}/rest/v1/profiles?id=eq.{id}", self.config.base_url)
    }

    async fn bearer(&self) -> String {
        self.access_token
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.config.api_key.clone())
    }
}

#[async_trait::async_trait]
impl ProfileRepository for RemoteProfileRepository {
    async fn fetch_by_id(&self, id: Uuid) -> Result<Profile, AuthError> {
        let response = self
            .http
            .get(self.rows_url(id))
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.bearer().await)
            .send()
            .await
            .map_err(|e| AuthError::ApiRequest(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| AuthError::ApiRequest(e.to_string()))?;
        if status != 200 {
            return Err(AuthError::ApiResponse { status, body: text });
        }
        parse_profile_rows(&text, id)
    }

    async fn update(&self, id: Uuid, patch: ProfilePatch) -> Result<Profile, AuthError> {
        let response = self
            .http
            .patch(self.rows_url(id))
            .header("apikey", &self.config.api_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer().await)
            .json(&patch)
            .send()
            .await
            .map_err(|e| AuthError::ApiRequest(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| AuthError::ApiRequest(e.to_string()))?;
        if status != 200 {
            return Err(AuthError::ApiResponse { status, body: text });
        }
        parse_profile_rows(&text, id)
    }
}

// =============================================================================
// WIRE TYPES / PARSING
// =============================================================================

#[derive(Deserialize)]
struct TokenGrantResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
    user: WireUser,
}

#[derive(Deserialize)]
struct WireUser {
    id: Uuid,
    email: Option<String>,
    user_metadata: Option<serde_json::Value>,
}

fn parse_token_grant(json: &str) -> Result<Session, AuthError> {
    let grant: TokenGrantResponse = serde_json::from_str(json).map_err(|e| AuthError::ApiParse(e.to_string()))?;
    let display_name = grant
        .user
        .user_metadata
        .as_ref()
        .and_then(|m| m.get("display_name"))
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    Ok(Session {
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
        expires_in: grant.expires_in,
        user: AuthUser { id: grant.user.id, email: grant.user.email.unwrap_or_default(), display_name },
    })
}

/// The rows endpoint answers with a JSON array; a profile lookup expects
/// exactly one element.
fn parse_profile_rows(json: &str, id: Uuid) -> Result<Profile, AuthError> {
    let rows: Vec<Profile> = serde_json::from_str(json).map_err(|e| AuthError::ApiParse(e.to_string()))?;
    rows.into_iter().next().ok_or(AuthError::ProfileNotFound(id))
}

#[cfg(test)]
#[path = "remote_test.rs"]
mod tests;
