//! Collaborator traits — the session store and the profile repository.
//!
//! DESIGN
//! ======
//! Both external services are injected as trait objects rather than reached
//! through an ambient singleton client, so the controller can be exercised
//! against in-memory fakes. The session store's callback-style notification
//! API is modeled as a broadcast channel of [`AuthChange`] events; dropping
//! the receiver is the unsubscribe.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AuthError;
use crate::profile::{Profile, ProfilePatch};
use crate::session::{AuthChange, Session};

/// Hosted identity provider: issues sessions and notifies on lifecycle moves.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Register a new account. Profile-row creation happens server-side as a
    /// side effect and is not guaranteed to be visible immediately.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the provider rejects the registration or
    /// the request fails.
    async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<(), AuthError>;

    /// Password sign-in. On success a `SignedIn` event follows on the
    /// subscription; callers must not assume state is populated when this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] on rejection, or a transport
    /// error if the request fails.
    async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError>;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the remote call fails; callers clear local
    /// state regardless.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The session currently held by the provider, if any.
    async fn current_session(&self) -> Option<Session>;

    /// Subscribe to lifecycle events. Each receiver sees every event emitted
    /// after the call; drop it to unsubscribe.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}

/// Row-level-secured relational store holding one profile per identity.
#[async_trait::async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch the profile row keyed by `id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ProfileNotFound`] when no row exists, or a
    /// transport/parse error.
    async fn fetch_by_id(&self, id: Uuid) -> Result<Profile, AuthError>;

    /// Apply a partial update to the profile row keyed by `id` and return
    /// the updated row.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the row is missing or the request fails.
    async fn update(&self, id: Uuid, patch: ProfilePatch) -> Result<Profile, AuthError>;
}

// =============================================================================
// TEST FAKES
// =============================================================================
