//! Auth lifecycle controller — single source of truth for "who is logged in
//! and what is their profile."
//!
//! DESIGN
//! ======
//! The controller owns [`AuthState`] behind a `tokio::sync::watch` channel
//! and mutates it from exactly two places: the imperative operations
//! (`sign_in`, `sign_out`, ...) and a spawned task draining the session
//! store's event stream. Guards and views only read the watch channel.
//!
//! The provider fires `SignedIn` both for genuine new logins and for silent
//! token recovery of an already-known identity. Re-fetching the profile on
//! every such event would mean visible loading flicker and redundant network
//! calls, so the fetch decision is a pure function over explicit markers
//! (`last_requested` identity, `fetched_ok`) rather than event kind alone.
//!
//! ERROR HANDLING
//! ==============
//! Credential errors from `sign_in`/`sign_up` propagate to the caller.
//! Everything on the profile path degrades to `profile = None` with
//! `loading = false`; a slow repository is cut off by a hard timeout so the
//! state machine can never park in a loading state.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::profile::Profile;
use crate::session::{AuthChange, AuthUser, Session};
use crate::store::{ProfileRepository, SessionStore};

// =============================================================================
// VIEW STATE
// =============================================================================

/// The reactive tuple exposed to guards and views.
///
/// `is_authenticated` depends only on `user`; a null profile while
/// authenticated is a legal (transient or degraded) state.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<AuthUser>,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    /// True only during bootstrap or an in-flight transition; bounded by the
    /// profile-fetch timeout.
    pub loading: bool,
}

impl AuthState {
    /// State before bootstrap has resolved.
    #[must_use]
    pub fn booting() -> Self {
        Self { user: None, session: None, profile: None, loading: true }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    fn clear(&mut self) {
        self.user = None;
        self.session = None;
        self.profile = None;
        self.loading = false;
    }
}

// =============================================================================
// FETCH DECISION
// =============================================================================

/// Markers the fetch rule is evaluated against. Folded into explicit state
/// instead of side-channel mutable cells so the rule stays a deterministic
/// function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FetchMarkers {
    /// Identity a fetch was last issued for.
    pub(crate) last_requested: Option<Uuid>,
    /// Whether any fetch has completed successfully for this controller.
    pub(crate) fetched_ok: bool,
}

impl FetchMarkers {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What a lifecycle event asks the controller to do about the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchDecision {
    /// No session: drop profile and markers.
    Clear,
    /// (Re)fetch the profile for this identity.
    Fetch(Uuid),
    /// Same identity, profile already in hand (token refresh): keep as is.
    Keep,
}

/// The profile-fetch rule, evaluated in order:
///
/// 1. no session on the event → clear;
/// 2. event identity differs from the last requested one → fetch;
/// 3. nothing fetched successfully yet and the event is not the initial
///    one → fetch;
/// 4. otherwise keep the existing profile untouched.
pub(crate) fn decide_fetch(event: &AuthChange, markers: FetchMarkers) -> FetchDecision {
    let Some(id) = event.user_id() else {
        return FetchDecision::Clear;
    };
    if markers.last_requested != Some(id) {
        return FetchDecision::Fetch(id);
    }
    if !markers.fetched_ok && !event.is_initial() {
        return FetchDecision::Fetch(id);
    }
    FetchDecision::Keep
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Owns session/profile state and mediates between the session store's event
/// stream and the rest of the application.
pub struct AuthController {
    store: Arc<dyn SessionStore>,
    profiles: Arc<dyn ProfileRepository>,
    config: AuthConfig,
    state_tx: watch::Sender<AuthState>,
    markers: Mutex<FetchMarkers>,
}

impl AuthController {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, profiles: Arc<dyn ProfileRepository>, config: AuthConfig) -> Arc<Self> {
        let (state_tx, _) = watch::channel(AuthState::booting());
        Arc::new(Self { store, profiles, config, state_tx, markers: Mutex::new(FetchMarkers::default()) })
    }

    /// Subscribe to state changes. The receiver always holds the latest
    /// [`AuthState`].
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    /// Run bootstrap, then drain lifecycle events until the store's channel
    /// closes. Returns a handle for shutdown.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        // Subscribe before bootstrap so no event emitted during bootstrap is
        // lost; the fetch rule is idempotent under either interleaving.
        let rx = self.store.subscribe();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.bootstrap().await;
            this.event_loop(rx).await;
        })
    }

    /// Initial de-authentication: any persisted remote session is discarded
    /// so every application load starts logged out.
    async fn bootstrap(self: &Arc<Self>) {
        let existing = self.store.current_session().await;
        if self.config.discard_session_on_boot {
            if existing.is_some() {
                info!("discarding persisted session on boot");
                if let Err(e) = self.store.sign_out().await {
                    warn!(error = %e, "boot sign-out failed; starting logged out regardless");
                }
            }
            self.handle_event(AuthChange::InitialSession(None)).await;
        } else {
            self.handle_event(AuthChange::InitialSession(existing)).await;
        }
    }

    async fn event_loop(self: &Arc<Self>, mut rx: broadcast::Receiver<AuthChange>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.handle_event(event).await,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // State is re-derived from each event, so skipped events
                    // only delay convergence until the next one.
                    warn!(missed, "auth event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("auth event stream closed");
                    break;
                }
            }
        }
    }

    /// One state-machine transition. A fetch runs on its own task so the
    /// event loop stays responsive to later lifecycle events (a sign-out
    /// must not queue behind a slow repository); the identity tag in
    /// [`AuthController::apply_fetch_result`] keeps the overlap safe. The
    /// fetch always terminates with `loading = false`, whatever the
    /// repository does.
    async fn handle_event(self: &Arc<Self>, event: AuthChange) {
        let decision = {
            let markers = self.markers.lock().unwrap();
            decide_fetch(&event, *markers)
        };

        match decision {
            FetchDecision::Clear => {
                self.markers.lock().unwrap().reset();
                self.state_tx.send_modify(AuthState::clear);
            }
            FetchDecision::Keep => {
                let session = event.session().cloned();
                self.state_tx.send_modify(|s| {
                    s.user = session.as_ref().map(|sess| sess.user.clone());
                    s.session = session;
                    s.loading = false;
                });
            }
            FetchDecision::Fetch(id) => {
                self.markers.lock().unwrap().last_requested = Some(id);
                let session = event.session().cloned();
                self.state_tx.send_modify(|s| {
                    s.user = session.as_ref().map(|sess| sess.user.clone());
                    s.session = session;
                    // A previous identity's profile must not show through
                    // while the new one loads.
                    if s.profile.as_ref().map(|p| p.id) != Some(id) {
                        s.profile = None;
                    }
                    s.loading = true;
                });
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    let profile = this.fetch_profile(id).await;
                    this.apply_fetch_result(id, profile);
                });
            }
        }
    }

    /// Fetch the profile for `id`, retrying transient failures with linear
    /// back-off, the whole loop bounded by one hard deadline.
    async fn fetch_profile(&self, id: Uuid) -> Option<Profile> {
        let deadline = self.config.profile_fetch_timeout;
        let attempts = self.config.profile_fetch_retries.max(1);
        let base = self.config.profile_retry_base;

        let fetch_loop = async {
            for attempt in 1..=attempts {
                match self.profiles.fetch_by_id(id).await {
                    Ok(profile) => return Some(profile),
                    Err(e) if e.retryable() && attempt < attempts => {
                        // Covers the row not being visible yet right after
                        // sign-up (backend eventual consistency).
                        debug!(error = %e, attempt, %id, "profile fetch failed; retrying");
                        tokio::time::sleep(base * u32::try_from(attempt).unwrap_or(u32::MAX)).await;
                    }
                    Err(e) => {
                        warn!(error = %e, %id, "profile fetch failed; continuing without profile");
                        return None;
                    }
                }
            }
            None
        };

        match tokio::time::timeout(deadline, fetch_loop).await {
            Ok(profile) => profile,
            Err(_) => {
                warn!(%id, timeout = ?deadline, "profile fetch timed out; continuing without profile");
                None
            }
        }
    }

    /// Apply a completed fetch, discarding it if the controller has since
    /// moved to a different identity (slow stale fetch must not overwrite a
    /// newer profile).
    fn apply_fetch_result(&self, requested_for: Uuid, profile: Option<Profile>) {
        self.state_tx.send_modify(|s| {
            let current = s.user.as_ref().map(|u| u.id);
            if current == Some(requested_for) {
                if profile.is_some() {
                    self.markers.lock().unwrap().fetched_ok = true;
                    s.profile = profile;
                }
                s.loading = false;
            } else if current.is_none() {
                // Signed out while the fetch was in flight.
                s.loading = false;
            }
            // A different identity took over: its own transition owns
            // `loading` now, drop the stale result on the floor.
        });
    }

    // =========================================================================
    // IMPERATIVE OPERATIONS
    // =========================================================================

    /// Register a new account. The matching profile row is created
    /// server-side as a side effect; it may lag the account itself, which is
    /// why the fetch path retries on not-found.
    ///
    /// # Errors
    ///
    /// Propagates provider rejections so the form can display them.
    pub async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<(), AuthError> {
        self.store.sign_up(email, password, display_name).await
    }

    /// Password sign-in. State is populated asynchronously by the `SignedIn`
    /// event that follows a successful call; do not read `user`/`profile`
    /// synchronously after this returns.
    ///
    /// # Errors
    ///
    /// Propagates credential errors so the form can display them.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.state_tx.send_modify(|s| s.loading = true);
        match self.store.sign_in(email, password).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state_tx.send_modify(|s| s.loading = false);
                Err(e)
            }
        }
    }

    /// End the session. Local state is cleared no matter what the remote
    /// call does; a network error on logout must not leave a ghost login.
    pub async fn sign_out(&self) {
        if let Err(e) = self.store.sign_out().await {
            warn!(error = %e, "remote sign-out failed; clearing local state anyway");
        }
        self.markers.lock().unwrap().reset();
        self.state_tx.send_modify(AuthState::clear);
    }

    /// Re-fetch the profile for the current identity. No-op when logged out.
    pub async fn refresh_profile(&self) {
        let Some(id) = self.state_tx.borrow().user.as_ref().map(|u| u.id) else {
            return;
        };
        self.state_tx.send_modify(|s| s.loading = true);
        let profile = self.fetch_profile(id).await;
        self.apply_fetch_result(id, profile);
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
