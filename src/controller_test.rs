use super::*;
use crate::profile::Role;
use crate::store::test_helpers::{FakeProfileRepository, FakeSessionStore, dummy_profile, dummy_session};

// =============================================================================
// HARNESS
// =============================================================================

struct Harness {
    store: Arc<FakeSessionStore>,
    profiles: Arc<FakeProfileRepository>,
    controller: Arc<AuthController>,
    state: watch::Receiver<AuthState>,
}

/// Spawn a controller over fresh fakes and wait for bootstrap to resolve.
async fn booted_with(config: AuthConfig, store: FakeSessionStore, profiles: FakeProfileRepository) -> Harness {
    let store = Arc::new(store);
    let profiles = Arc::new(profiles);
    let controller = AuthController::new(
        Arc::clone(&store) as Arc<dyn SessionStore>,
        Arc::clone(&profiles) as Arc<dyn ProfileRepository>,
        config,
    );
    controller.spawn();
    let mut state = controller.subscribe();
    state.wait_for(|s| !s.loading).await.unwrap();
    Harness { store, profiles, controller, state }
}

async fn booted() -> Harness {
    booted_with(AuthConfig::default(), FakeSessionStore::new(), FakeProfileRepository::new()).await
}

/// Drive a full sign-in for `id` and wait until the profile is in hand.
async fn signed_in(harness: &mut Harness, id: Uuid, role: Role) {
    harness.profiles.insert(dummy_profile(id, role));
    harness.store.accept_sign_in(dummy_session(id));
    harness.controller.sign_in("who@example.org", "pw").await.unwrap();
    harness
        .state
        .wait_for(|s| s.profile.as_ref().map(|p| p.id) == Some(id))
        .await
        .unwrap();
}

// =============================================================================
// decide_fetch — the pure fetch rule
// =============================================================================

#[test]
fn rule_1_no_session_clears() {
    let markers = FetchMarkers { last_requested: Some(Uuid::new_v4()), fetched_ok: true };
    assert_eq!(decide_fetch(&AuthChange::SignedOut, markers), FetchDecision::Clear);
    assert_eq!(decide_fetch(&AuthChange::InitialSession(None), markers), FetchDecision::Clear);
}

#[test]
fn rule_2_new_identity_fetches() {
    let known = Uuid::new_v4();
    let other = Uuid::new_v4();
    let markers = FetchMarkers { last_requested: Some(known), fetched_ok: true };
    let event = AuthChange::SignedIn(dummy_session(other));
    assert_eq!(decide_fetch(&event, markers), FetchDecision::Fetch(other));
}

#[test]
fn rule_2_applies_even_to_the_initial_event() {
    let id = Uuid::new_v4();
    let event = AuthChange::InitialSession(Some(dummy_session(id)));
    assert_eq!(decide_fetch(&event, FetchMarkers::default()), FetchDecision::Fetch(id));
}

#[test]
fn rule_3_unfetched_identity_retries_on_later_events() {
    let id = Uuid::new_v4();
    let markers = FetchMarkers { last_requested: Some(id), fetched_ok: false };
    let event = AuthChange::SignedIn(dummy_session(id));
    assert_eq!(decide_fetch(&event, markers), FetchDecision::Fetch(id));
}

#[test]
fn rule_4_initial_event_for_pending_identity_keeps() {
    let id = Uuid::new_v4();
    let markers = FetchMarkers { last_requested: Some(id), fetched_ok: false };
    let event = AuthChange::InitialSession(Some(dummy_session(id)));
    assert_eq!(decide_fetch(&event, markers), FetchDecision::Keep);
}

#[test]
fn rule_4_token_refresh_for_known_identity_keeps() {
    let id = Uuid::new_v4();
    let markers = FetchMarkers { last_requested: Some(id), fetched_ok: true };
    assert_eq!(
        decide_fetch(&AuthChange::TokenRefreshed(dummy_session(id)), markers),
        FetchDecision::Keep
    );
    assert_eq!(
        decide_fetch(&AuthChange::SignedIn(dummy_session(id)), markers),
        FetchDecision::Keep
    );
}

// =============================================================================
// bootstrap
// =============================================================================

#[tokio::test]
async fn bootstrap_discards_persisted_session() {
    let store = FakeSessionStore::new();
    store.seed_session(dummy_session(Uuid::new_v4()));
    let harness = booted_with(AuthConfig::default(), store, FakeProfileRepository::new()).await;

    let state = harness.controller.state();
    assert!(!state.is_authenticated());
    assert!(state.session.is_none());
    assert!(!state.loading);
    assert_eq!(harness.store.sign_out_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn bootstrap_without_session_resolves_unauthenticated() {
    let harness = booted().await;
    let state = harness.controller.state();
    assert!(!state.is_authenticated());
    assert!(state.profile.is_none());
    assert!(!state.loading);
}

#[tokio::test]
async fn bootstrap_adopts_session_when_discard_disabled() {
    let id = Uuid::new_v4();
    let store = FakeSessionStore::new();
    store.seed_session(dummy_session(id));
    let profiles = FakeProfileRepository::new();
    profiles.insert(dummy_profile(id, Role::Member));

    let config = AuthConfig { discard_session_on_boot: false, ..AuthConfig::default() };
    let harness = booted_with(config, store, profiles).await;

    let state = harness.controller.state();
    assert!(state.is_authenticated());
    assert_eq!(state.profile.as_ref().map(|p| p.id), Some(id));
    assert_eq!(harness.store.sign_out_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

// =============================================================================
// sign-in
// =============================================================================

#[tokio::test]
async fn sign_in_reaches_authenticated_with_profile() {
    let mut harness = booted().await;
    let id = Uuid::new_v4();
    signed_in(&mut harness, id, Role::Member).await;

    let state = harness.controller.state();
    assert_eq!(state.user.as_ref().map(|u| u.id), Some(id));
    assert!(state.session.is_some());
    assert!(!state.loading);
}

#[tokio::test]
async fn sign_in_rejection_propagates_and_clears_loading() {
    let harness = booted().await;
    let err = harness.controller.sign_in("who@example.org", "wrong").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    let state = harness.controller.state();
    assert!(!state.is_authenticated());
    assert!(!state.loading);
}

#[tokio::test]
async fn sign_up_delegates_to_store() {
    let harness = booted().await;
    harness
        .controller
        .sign_up("new@example.org", "pw", "Newcomer")
        .await
        .unwrap();
}

// =============================================================================
// fetch-once policy
// =============================================================================

#[tokio::test]
async fn token_refresh_does_not_refetch_profile() {
    let mut harness = booted().await;
    let id = Uuid::new_v4();
    signed_in(&mut harness, id, Role::Member).await;
    assert_eq!(harness.profiles.fetch_count(), 1);

    let mut renewed = dummy_session(id);
    renewed.access_token = "renewed".into();
    harness.store.emit(AuthChange::TokenRefreshed(renewed));
    harness
        .state
        .wait_for(|s| s.session.as_ref().is_some_and(|sess| sess.access_token == "renewed"))
        .await
        .unwrap();

    assert_eq!(harness.profiles.fetch_count(), 1);
    assert!(harness.controller.state().profile.is_some());
}

#[tokio::test]
async fn sign_in_event_for_same_identity_does_not_refetch() {
    let mut harness = booted().await;
    let id = Uuid::new_v4();
    signed_in(&mut harness, id, Role::Member).await;

    let mut recovered = dummy_session(id);
    recovered.access_token = "recovered".into();
    harness.store.emit(AuthChange::SignedIn(recovered));
    harness
        .state
        .wait_for(|s| s.session.as_ref().is_some_and(|sess| sess.access_token == "recovered"))
        .await
        .unwrap();

    assert_eq!(harness.profiles.fetch_count(), 1);
}

#[tokio::test]
async fn new_identity_triggers_refetch() {
    let mut harness = booted().await;
    let first = Uuid::new_v4();
    signed_in(&mut harness, first, Role::Member).await;

    let second = Uuid::new_v4();
    harness.profiles.insert(dummy_profile(second, Role::Admin));
    harness.store.emit(AuthChange::SignedIn(dummy_session(second)));
    harness
        .state
        .wait_for(|s| s.profile.as_ref().map(|p| p.id) == Some(second))
        .await
        .unwrap();

    assert_eq!(harness.profiles.fetch_count(), 2);
    assert_eq!(harness.controller.state().user.map(|u| u.id), Some(second));
}

#[tokio::test(start_paused = true)]
async fn missing_profile_refetches_on_next_sign_in_event() {
    let mut harness = booted().await;
    let id = Uuid::new_v4();

    // No row yet: every attempt reports not-found, fetch resolves empty.
    harness.store.accept_sign_in(dummy_session(id));
    harness.controller.sign_in("who@example.org", "pw").await.unwrap();
    harness
        .state
        .wait_for(|s| s.is_authenticated() && !s.loading)
        .await
        .unwrap();
    assert!(harness.controller.state().profile.is_none());
    let attempts_so_far = harness.profiles.fetch_count();
    assert!(attempts_so_far >= 1);

    // Row appears, provider fires another signed-in for the same identity:
    // the unfetched marker forces one more fetch.
    harness.profiles.insert(dummy_profile(id, Role::Member));
    harness.store.emit(AuthChange::SignedIn(dummy_session(id)));
    harness
        .state
        .wait_for(|s| s.profile.is_some())
        .await
        .unwrap();
    assert_eq!(harness.profiles.fetch_count(), attempts_so_far + 1);
}

// =============================================================================
// timeouts and eventual consistency
// =============================================================================

#[tokio::test(start_paused = true)]
async fn hanging_fetch_resolves_loading_within_timeout() {
    let mut harness = booted().await;
    let id = Uuid::new_v4();
    harness.profiles.hang_forever();
    harness.store.accept_sign_in(dummy_session(id));
    harness.controller.sign_in("who@example.org", "pw").await.unwrap();

    harness
        .state
        .wait_for(|s| s.is_authenticated() && !s.loading)
        .await
        .unwrap();

    let state = harness.controller.state();
    assert!(state.user.is_some());
    assert!(state.profile.is_none());
    assert!(!state.loading);
}

#[tokio::test(start_paused = true)]
async fn sign_out_is_not_queued_behind_a_hanging_fetch() {
    let mut harness = booted().await;
    harness.profiles.hang_forever();
    harness.store.accept_sign_in(dummy_session(Uuid::new_v4()));
    harness.controller.sign_in("who@example.org", "pw").await.unwrap();
    harness.state.wait_for(|s| s.is_authenticated()).await.unwrap();

    let before = tokio::time::Instant::now();
    harness.store.emit(AuthChange::SignedOut);
    harness.state.wait_for(|s| !s.is_authenticated()).await.unwrap();

    // Processed right away; never waits out the fetch deadline.
    assert!(before.elapsed() < AuthConfig::default().profile_fetch_timeout);
    assert!(!harness.controller.state().loading);
}

#[tokio::test(start_paused = true)]
async fn retry_covers_profile_row_lag() {
    let mut harness = booted().await;
    let id = Uuid::new_v4();
    harness.profiles.insert(dummy_profile(id, Role::Member));
    // Row invisible for the first two reads, as right after account creation.
    harness.profiles.delay_visibility(2);

    harness.store.accept_sign_in(dummy_session(id));
    harness.controller.sign_in("who@example.org", "pw").await.unwrap();
    harness
        .state
        .wait_for(|s| s.profile.is_some())
        .await
        .unwrap();

    assert_eq!(harness.profiles.fetch_count(), 3);
}

// =============================================================================
// sign-out
// =============================================================================

#[tokio::test]
async fn sign_out_clears_state() {
    let mut harness = booted().await;
    signed_in(&mut harness, Uuid::new_v4(), Role::Member).await;

    harness.controller.sign_out().await;
    let state = harness.controller.state();
    assert!(state.user.is_none());
    assert!(state.session.is_none());
    assert!(state.profile.is_none());
    assert!(!state.loading);
}

#[tokio::test]
async fn sign_out_clears_state_even_when_remote_fails() {
    let mut harness = booted().await;
    signed_in(&mut harness, Uuid::new_v4(), Role::Member).await;

    harness.store.fail_sign_out();
    harness.controller.sign_out().await;

    let state = harness.controller.state();
    assert!(state.user.is_none());
    assert!(state.session.is_none());
    assert!(state.profile.is_none());
    assert!(!state.loading);
}

// =============================================================================
// refresh_profile
// =============================================================================

#[tokio::test]
async fn refresh_profile_is_noop_when_unauthenticated() {
    let harness = booted().await;
    harness.controller.refresh_profile().await;
    assert_eq!(harness.profiles.fetch_count(), 0);
}

#[tokio::test]
async fn refresh_profile_picks_up_row_changes() {
    let mut harness = booted().await;
    let id = Uuid::new_v4();
    signed_in(&mut harness, id, Role::Member).await;

    let mut updated = dummy_profile(id, Role::Member);
    updated.credits = 99;
    harness.profiles.insert(updated);
    harness.controller.refresh_profile().await;

    let state = harness.controller.state();
    assert_eq!(state.profile.map(|p| p.credits), Some(99));
    assert!(!state.loading);
}

// =============================================================================
// stale fetch results
// =============================================================================

#[tokio::test]
async fn stale_result_for_previous_identity_is_discarded() {
    let store = Arc::new(FakeSessionStore::new());
    let profiles = Arc::new(FakeProfileRepository::new());
    let controller = AuthController::new(
        Arc::clone(&store) as Arc<dyn SessionStore>,
        Arc::clone(&profiles) as Arc<dyn ProfileRepository>,
        AuthConfig::default(),
    );

    let slow_identity = Uuid::new_v4();
    let current = dummy_session(Uuid::new_v4());
    controller.state_tx.send_modify(|s| {
        s.user = Some(current.user.clone());
        s.session = Some(current.clone());
        s.loading = true;
    });

    controller.apply_fetch_result(slow_identity, Some(dummy_profile(slow_identity, Role::Admin)));

    // The newer identity's own transition still owns `loading`.
    let state = controller.state();
    assert!(state.profile.is_none());
    assert!(state.loading);
}

#[tokio::test]
async fn result_arriving_after_sign_out_only_clears_loading() {
    let store = Arc::new(FakeSessionStore::new());
    let profiles = Arc::new(FakeProfileRepository::new());
    let controller = AuthController::new(
        Arc::clone(&store) as Arc<dyn SessionStore>,
        Arc::clone(&profiles) as Arc<dyn ProfileRepository>,
        AuthConfig::default(),
    );

    let slow_identity = Uuid::new_v4();
    controller.state_tx.send_modify(|s| s.loading = true);
    controller.apply_fetch_result(slow_identity, Some(dummy_profile(slow_identity, Role::Member)));

    let state = controller.state();
    assert!(state.profile.is_none());
    assert!(!state.loading);
}
