//! Auth error taxonomy.
//!
//! Credential errors surface verbatim to the calling form; everything on the
//! profile path degrades to "no profile" at the controller boundary instead
//! of propagating.

/// Errors produced by session-store and profile-repository operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Sign-in rejected by the identity provider (wrong email/password).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Sign-up rejected by the identity provider.
    #[error("sign-up rejected: {0}")]
    SignUpRejected(String),

    /// The HTTP request to the backend failed before a response arrived.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The backend returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The backend response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// No profile row exists for the requested identity.
    #[error("profile not found for {0}")]
    ProfileNotFound(uuid::Uuid),

    /// The operation did not complete within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl AuthError {
    /// `true` when a retry against the backend could plausibly succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::ApiRequest(_)
                | Self::ProfileNotFound(_)
                | Self::Timeout(_)
                | Self::ApiResponse { status: 429 | 500..=599, .. }
        )
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
