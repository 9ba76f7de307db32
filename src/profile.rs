//! Profile record — the application-owned row paired one-to-one with an
//! identity.
//!
//! A profile is fetched, never synthesized client-side: a failed or timed-out
//! fetch leaves it `None` while the identity stays authenticated. Those are
//! independent facts and downstream code must not conflate them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ROLE / STATUS
// =============================================================================

/// Application role stored on the profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Member,
    Visitor,
}

/// Moderation status of a member account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    Pending,
    Approved,
    PendingReview,
    Rejected,
}

// =============================================================================
// PROFILE
// =============================================================================

/// One row of the `profiles` table, keyed by the identity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Equals the identity id of the owning user.
    pub id: Uuid,
    pub display_name: String,
    pub role: Role,
    pub status: ProfileStatus,
    /// Exchange-credit balance.
    pub credits: i64,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl Profile {
    /// `true` when this profile grants access to the admin back-office.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Partial update applied to a profile row.
///
/// `None` fields are left untouched; used by both the self-service edit flow
/// and the admin role/status flow.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProfileStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ProfilePatch {
    /// `true` when the patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.role.is_none()
            && self.status.is_none()
            && self.credits.is_none()
            && self.contact.is_none()
            && self.bio.is_none()
    }
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
