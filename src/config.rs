//! Controller and remote-client configuration.
//!
//! Defaults are compiled in; each knob can be overridden from the
//! environment. The remote client additionally needs the backend base URL
//! and public API key, which have no sensible defaults.

use std::time::Duration;

use crate::error::AuthError;

pub const DEFAULT_PROFILE_FETCH_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PROFILE_FETCH_RETRIES: usize = 3;
pub const DEFAULT_PROFILE_RETRY_BASE_MS: u64 = 250;
pub const DEFAULT_ADMIN_VERIFY_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

// =============================================================================
// CONTROLLER CONFIG
// =============================================================================

/// Tuning knobs for the auth lifecycle controller and the admin guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthConfig {
    /// Hard deadline for a single profile fetch attempt.
    pub profile_fetch_timeout: Duration,
    /// Attempts against a not-yet-visible profile row after a fresh sign-in.
    pub profile_fetch_retries: usize,
    /// Base delay for the linear retry back-off.
    pub profile_retry_base: Duration,
    /// How long the admin guard waits for verification before giving up.
    pub admin_verify_timeout: Duration,
    /// Discard any persisted remote session on bootstrap, forcing a fresh
    /// login on every application load.
    pub discard_session_on_boot: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            profile_fetch_timeout: Duration::from_secs(DEFAULT_PROFILE_FETCH_TIMEOUT_SECS),
            profile_fetch_retries: DEFAULT_PROFILE_FETCH_RETRIES,
            profile_retry_base: Duration::from_millis(DEFAULT_PROFILE_RETRY_BASE_MS),
            admin_verify_timeout: Duration::from_secs(DEFAULT_ADMIN_VERIFY_TIMEOUT_SECS),
            discard_session_on_boot: true,
        }
    }
}

impl AuthConfig {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// - `AUTH_PROFILE_FETCH_TIMEOUT_SECS`: default 5
    /// - `AUTH_PROFILE_FETCH_RETRIES`: default 3
    /// - `AUTH_PROFILE_RETRY_BASE_MS`: default 250
    /// - `AUTH_ADMIN_VERIFY_TIMEOUT_SECS`: default 8
    /// - `AUTH_DISCARD_SESSION_ON_BOOT`: default true
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            profile_fetch_timeout: Duration::from_secs(env_parse(
                "AUTH_PROFILE_FETCH_TIMEOUT_SECS",
                DEFAULT_PROFILE_FETCH_TIMEOUT_SECS,
            )),
            profile_fetch_retries: env_parse("AUTH_PROFILE_FETCH_RETRIES", DEFAULT_PROFILE_FETCH_RETRIES),
            profile_retry_base: Duration::from_millis(env_parse(
                "AUTH_PROFILE_RETRY_BASE_MS",
                DEFAULT_PROFILE_RETRY_BASE_MS,
            )),
            admin_verify_timeout: Duration::from_secs(env_parse(
                "AUTH_ADMIN_VERIFY_TIMEOUT_SECS",
                DEFAULT_ADMIN_VERIFY_TIMEOUT_SECS,
            )),
            discard_session_on_boot: env_bool("AUTH_DISCARD_SESSION_ON_BOOT", true),
        }
    }
}

// =============================================================================
// REMOTE CONFIG
// =============================================================================

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL of the backend, without trailing slash.
    pub base_url: String,
    /// Public (anon) API key sent with every request.
    pub api_key: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl RemoteConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Build from `AUTH_API_BASE_URL` and `AUTH_API_KEY`, with optional
    /// `AUTH_REQUEST_TIMEOUT_SECS` / `AUTH_CONNECT_TIMEOUT_SECS` overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if either required variable is missing.
    pub fn from_env() -> Result<Self, AuthError> {
        let base_url = std::env::var("AUTH_API_BASE_URL")
            .map_err(|_| AuthError::ApiRequest("AUTH_API_BASE_URL not set".into()))?;
        let api_key =
            std::env::var("AUTH_API_KEY").map_err(|_| AuthError::ApiRequest("AUTH_API_KEY not set".into()))?;
        let mut config = Self::new(base_url, api_key);
        config.request_timeout =
            Duration::from_secs(env_parse("AUTH_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS));
        config.connect_timeout =
            Duration::from_secs(env_parse("AUTH_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS));
        Ok(config)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
