//! Route guards — render decisions derived from [`AuthState`].
//!
//! Guards never render anything themselves; they map the controller's state
//! to a decision enum the embedding UI turns into a placeholder, a redirect,
//! a denial screen, or the protected content. Network and timeout failures
//! degrade to visible terminal states with a manual retry path; a guard must
//! never spin forever.

use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::config::AuthConfig;
use crate::controller::AuthState;

// =============================================================================
// AUTHENTICATED-ONLY GUARD
// =============================================================================

/// Decision for a route that requires a login but no particular role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Auth state still resolving; show a placeholder.
    Loading,
    /// Not logged in; send to the login entry point.
    RedirectToLogin,
    /// Render the protected content.
    Render,
}

/// Guard for "must be authenticated" routes. No profile requirement: a
/// logged-in user with a missing profile still gets through.
#[must_use]
pub fn require_authenticated(state: &AuthState) -> GuardOutcome {
    if state.loading {
        GuardOutcome::Loading
    } else if state.is_authenticated() {
        GuardOutcome::Render
    } else {
        GuardOutcome::RedirectToLogin
    }
}

// =============================================================================
// ADMIN GUARD
// =============================================================================

/// Decision for the admin back-office entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminOutcome {
    /// Verification in progress; show a placeholder.
    Loading,
    /// Not logged in; send to the admin login entry point.
    RedirectToLogin,
    /// Authenticated but not an admin. Terminal: shown, never auto-bounced.
    Denied,
    /// Verification did not complete in time. Terminal, distinct from
    /// [`AdminOutcome::Denied`]; offers retry (via [`AdminGuard::reset`]) or
    /// return home.
    TimedOut,
    /// Render the back-office.
    Render,
}

/// Stateful guard for admin routes.
///
/// Carries a verification latch: once `role == admin` has been observed for
/// the current identity, the guard renders immediately on every later
/// evaluation and never re-enters loading or denied until a sign-out resets
/// it. This is what prevents a loading flash when the tab regains focus and
/// the controller briefly re-validates with a transient null profile.
#[derive(Debug)]
pub struct AdminGuard {
    verify_timeout: Duration,
    latch: bool,
    timed_out: bool,
    /// When the current verification wait began. Cleared on every resolved
    /// outcome so only consecutive unresolved evaluations accrue toward the
    /// timeout.
    started: Option<Instant>,
}

impl AdminGuard {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self { verify_timeout: config.admin_verify_timeout, latch: false, timed_out: false, started: None }
    }

    /// Whether admin status has been proven for the current identity.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.latch
    }

    /// Clear terminal states and restart the verification wait. This is the
    /// "retry" action on the timeout screen.
    pub fn reset(&mut self) {
        self.latch = false;
        self.timed_out = false;
        self.started = None;
    }

    /// Evaluate the guard against the current state.
    pub fn evaluate(&mut self, state: &AuthState) -> AdminOutcome {
        let elapsed = self
            .started
            .get_or_insert_with(Instant::now)
            .elapsed();
        self.evaluate_with_elapsed(state, elapsed)
    }

    /// Core decision, parameterized on elapsed wait so it is testable
    /// without a clock.
    fn evaluate_with_elapsed(&mut self, state: &AuthState, elapsed: Duration) -> AdminOutcome {
        // Losing authentication is the one thing that unsets the latch.
        if self.latch && !state.is_authenticated() {
            self.latch = false;
        }

        // Fast path: already proven admin for this identity. Skips every
        // other check so a background re-validation never flashes a spinner.
        if self.latch && state.is_authenticated() {
            self.started = None;
            return AdminOutcome::Render;
        }

        if self.timed_out {
            return AdminOutcome::TimedOut;
        }

        let unresolved = state.loading || (state.is_authenticated() && state.profile.is_none());
        if unresolved {
            if elapsed >= self.verify_timeout {
                info!(waited = ?elapsed, "admin verification timed out");
                self.timed_out = true;
                return AdminOutcome::TimedOut;
            }
            return AdminOutcome::Loading;
        }

        if !state.is_authenticated() {
            self.started = None;
            return AdminOutcome::RedirectToLogin;
        }

        // Resolved and authenticated, so a profile is present.
        let Some(profile) = state.profile.as_ref() else {
            return AdminOutcome::Loading;
        };
        if profile.is_admin() {
            self.latch = true;
            self.started = None;
            AdminOutcome::Render
        } else {
            // A later re-verification (profile refresh, new identity) gets a
            // fresh wait rather than inheriting this one's start.
            self.started = None;
            AdminOutcome::Denied
        }
    }
}

#[cfg(test)]
#[path = "guards_test.rs"]
mod tests;
