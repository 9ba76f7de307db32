use super::*;

fn sample(role: Role) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        display_name: "Nadia".into(),
        role,
        status: ProfileStatus::Approved,
        credits: 42,
        contact: Some("@nadia".into()),
        bio: None,
    }
}

// =============================================================================
// role / status wire format
// =============================================================================

#[test]
fn role_uses_snake_case_on_the_wire() {
    assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    assert_eq!(serde_json::to_string(&Role::Member).unwrap(), "\"member\"");
    assert_eq!(serde_json::to_string(&Role::Visitor).unwrap(), "\"visitor\"");
}

#[test]
fn status_pending_review_spelling() {
    assert_eq!(
        serde_json::to_string(&ProfileStatus::PendingReview).unwrap(),
        "\"pending_review\""
    );
    let status: ProfileStatus = serde_json::from_str("\"pending_review\"").unwrap();
    assert_eq!(status, ProfileStatus::PendingReview);
}

#[test]
fn unknown_role_fails_to_parse() {
    assert!(serde_json::from_str::<Role>("\"superuser\"").is_err());
}

// =============================================================================
// is_admin
// =============================================================================

#[test]
fn only_admin_role_is_admin() {
    assert!(sample(Role::Admin).is_admin());
    assert!(!sample(Role::Member).is_admin());
    assert!(!sample(Role::Visitor).is_admin());
}

// =============================================================================
// profile row parsing
// =============================================================================

#[test]
fn profile_row_parses_with_optional_fields_absent() {
    let id = Uuid::new_v4();
    let json = format!(
        r#"{{"id":"{id}","display_name":"Sam","role":"member","status":"pending","credits":0}}"#
    );
    let profile: Profile = serde_json::from_str(&json).unwrap();
    assert_eq!(profile.id, id);
    assert_eq!(profile.status, ProfileStatus::Pending);
    assert_eq!(profile.contact, None);
    assert_eq!(profile.bio, None);
}

// =============================================================================
// ProfilePatch
// =============================================================================

#[test]
fn default_patch_is_empty() {
    assert!(ProfilePatch::default().is_empty());
}

#[test]
fn patch_serializes_only_set_fields() {
    let patch = ProfilePatch { role: Some(Role::Admin), credits: Some(100), ..ProfilePatch::default() };
    assert!(!patch.is_empty());
    let json = serde_json::to_value(&patch).unwrap();
    assert_eq!(json, serde_json::json!({"role": "admin", "credits": 100}));
}
