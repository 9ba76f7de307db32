//! symbiosis-auth — client-side authentication lifecycle for the
//! Symbiosis/EcoConnect community-exchange platform.
//!
//! The crate owns the "who is logged in and what is their profile" state
//! machine: it consumes the hosted identity provider's lifecycle events,
//! fetches the application profile at most once per distinct signed-in
//! identity, bounds every remote wait with a timeout, and exposes route
//! guards (plain and admin) as render-decision enums for the UI layer.
//!
//! Collaborators are injected behind the [`store::SessionStore`] and
//! [`store::ProfileRepository`] traits; [`remote`] provides the HTTP
//! implementations against the hosted backend.

pub mod config;
pub mod controller;
pub mod error;
pub mod guards;
pub mod profile;
pub mod remote;
pub mod session;
pub mod store;

pub use config::{AuthConfig, RemoteConfig};
pub use controller::{AuthController, AuthState};
pub use error::AuthError;
pub use guards::{AdminGuard, AdminOutcome, GuardOutcome, require_authenticated};
pub use profile::{Profile, ProfilePatch, ProfileStatus, Role};
pub use session::{AuthChange, AuthUser, Session};
pub use store::{ProfileRepository, SessionStore};
