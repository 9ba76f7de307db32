//! Session and lifecycle-event types.
//!
//! A [`Session`] is the opaque credential bundle issued by the identity
//! provider; an [`AuthUser`] is the authenticated principal it belongs to.
//! [`AuthChange`] events are how the provider tells the controller that the
//! session moved: sign-in, sign-out, silent token refresh, or the first
//! event delivered after subscribing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// IDENTITY
// =============================================================================

/// The authenticated principal attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Provider-assigned unique identity id.
    pub id: Uuid,
    /// Email address the account was registered with.
    pub email: String,
    /// Display name carried as sign-up metadata, if any.
    #[serde(default)]
    pub display_name: Option<String>,
}

// =============================================================================
// SESSION
// =============================================================================

/// Credential bundle for one authenticated browser instance.
///
/// Held exclusively by the controller; application code never persists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: u64,
    /// The identity this session authenticates.
    pub user: AuthUser,
}

impl Session {
    /// Id of the identity this session belongs to.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

// =============================================================================
// LIFECYCLE EVENTS
// =============================================================================

/// A session lifecycle notification from the identity provider.
///
/// `SignedIn` fires both for genuine new logins and for internal token
/// recovery of an already-known identity; the controller's fetch rule tells
/// those apart by identity id, not by event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
    /// First event after subscribing, reporting whatever session existed.
    InitialSession(Option<Session>),
    /// A session became active (fresh login or token recovery).
    SignedIn(Session),
    /// The session ended.
    SignedOut,
    /// The access token was silently renewed for the same identity.
    TokenRefreshed(Session),
}

impl AuthChange {
    /// The session carried by this event, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::InitialSession(s) => s.as_ref(),
            Self::SignedIn(s) | Self::TokenRefreshed(s) => Some(s),
            Self::SignedOut => None,
        }
    }

    /// Identity id carried by this event, if a session is present.
    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        self.session().map(Session::user_id)
    }

    /// `true` for the first event delivered after subscribing.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        matches!(self, Self::InitialSession(_))
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
