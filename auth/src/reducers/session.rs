//! Session reducer: listener lifecycle and identity callbacks.
//!
//! # Transitions
//!
//! ```text
//! ListenerAttached               Uninitialized → Authenticating
//! IdentityChanged(Some(user))    * → Identified   (same uid while Identified,
//!                                                  Merging or Authenticated: no-op)
//! IdentityChanged(None)          * → Unauthenticated
//! ListenerFailed                 * → Error
//! ```

use super::{Effects, enter};
use crate::actions::SessionAction;
use crate::environment::SessionEnvironment;
use crate::providers::{IdentityProvider, Navigator, ProfileService};
use crate::state::{
    CombinedIdentity, CoordinatorState, IdentitySnapshot, ListenerStatus, PendingRedirect,
    SessionState,
};
use sessionflow_core::effect::Effect;
use sessionflow_core::environment::Clock;
use sessionflow_core::{SmallVec, async_effect, smallvec};

/// Session reducer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionReducer;

impl SessionReducer {
    /// Reduce a listener or identity action.
    pub fn reduce<P, S, N, C>(
        &self,
        state: &mut CoordinatorState,
        action: SessionAction,
        env: &SessionEnvironment<P, S, N, C>,
    ) -> Effects
    where
        P: IdentityProvider + Clone + 'static,
        S: ProfileService + Clone + 'static,
        N: Navigator + Clone + 'static,
        C: Clock + Clone + 'static,
    {
        match action {
            SessionAction::ListenerAttached => {
                tracing::info!("Identity listener attached");
                state.listener = ListenerStatus::Attached;
                if state.session == SessionState::Uninitialized {
                    enter(state, SessionState::Authenticating, &env.clock);
                }
                smallvec![Effect::None]
            },

            SessionAction::ListenerFailed { error } => {
                tracing::error!(error = %error, "Identity listener failed to attach");
                state.listener = ListenerStatus::Failed;
                enter(
                    state,
                    SessionState::Error {
                        reason: error.user_message().to_string(),
                    },
                    &env.clock,
                );
                smallvec![Effect::None]
            },

            SessionAction::IdentityChanged {
                snapshot: Some(snapshot),
            } => identify(state, snapshot, env),

            SessionAction::IdentityChanged { snapshot: None } => sign_out_locally(state, env),

            _ => SmallVec::new(),
        }
    }
}

/// Apply a confirmed identity.
///
/// Starts a new generation and schedules the profile fetch, unless the same
/// user is already identified.
pub(crate) fn identify<P, S, N, C>(
    state: &mut CoordinatorState,
    snapshot: IdentitySnapshot,
    env: &SessionEnvironment<P, S, N, C>,
) -> Effects
where
    P: IdentityProvider + Clone + 'static,
    S: ProfileService + Clone + 'static,
    N: Navigator + Clone + 'static,
    C: Clock + Clone + 'static,
{
    let duplicate = state.session.has_identity()
        && state
            .identity
            .as_ref()
            .is_some_and(|current| current.same_user(&snapshot));

    if duplicate {
        tracing::debug!(uid = %snapshot.uid, state = state.session.label(), "Duplicate identity ignored");
        return smallvec![Effect::None];
    }

    state.generation += 1;
    let generation = state.generation;

    tracing::info!(uid = %snapshot.uid, generation, "Identity confirmed");
    state.combined = Some(CombinedIdentity::from_identity(&snapshot));
    state.identity = Some(snapshot);
    state.profile = None;
    state.warning = None;
    enter(state, SessionState::Identified, &env.clock);

    smallvec![async_effect! {
        Some(SessionAction::SyncProfile { generation })
    }]
}

/// Drop the identity and everything derived from it.
///
/// Safe to apply repeatedly; a second call changes nothing.
pub(crate) fn sign_out_locally<P, S, N, C>(
    state: &mut CoordinatorState,
    env: &SessionEnvironment<P, S, N, C>,
) -> Effects
where
    P: IdentityProvider + Clone + 'static,
    S: ProfileService + Clone + 'static,
    N: Navigator + Clone + 'static,
    C: Clock + Clone + 'static,
{
    let had_identity = state.identity.is_some();

    if had_identity || state.session.has_identity() {
        // Outstanding profile results belong to the old identity.
        state.generation += 1;
    }

    state.identity = None;
    state.profile = None;
    state.combined = None;
    state.warning = None;

    // A landed visit is over; the next visit may capture a new target.
    if state.redirect.replayed {
        state.redirect = PendingRedirect::default();
    }

    enter(state, SessionState::Unauthenticated, &env.clock);

    if had_identity {
        tracing::info!(generation = state.generation, "Signed out");
        let tokens = env.tokens.clone();
        smallvec![async_effect! {
            tokens.clear().await;
            None
        }]
    } else {
        smallvec![Effect::None]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::reducers::CoordinatorReducer;
    use crate::test_support::{TestReducer, snapshot, test_env};
    use sessionflow_core::reducer::Reducer;
    use sessionflow_testing::{ReducerTest, assertions, collect_actions};

    #[test]
    fn listener_attach_starts_authenticating() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .when_action(SessionAction::ListenerAttached)
            .then_state(|state| {
                assert_eq!(state.session, SessionState::Authenticating);
                assert_eq!(state.listener, ListenerStatus::Attached);
                assert_eq!(state.history.len(), 1);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn identity_moves_to_identified_with_fallback_view() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([SessionAction::ListenerAttached])
            .when_action(SessionAction::IdentityChanged {
                snapshot: Some(snapshot("u1")),
            })
            .then_state(|state| {
                assert_eq!(state.session, SessionState::Identified);
                assert_eq!(state.generation, 1);
                let combined = state.combined.as_ref().unwrap();
                assert_eq!(combined.uid, "u1");
                assert_eq!(combined.email.as_deref(), Some("u1@example.com"));
                assert!(combined.id.is_none());
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[tokio::test]
    async fn identification_schedules_profile_sync_for_its_generation() {
        let reducer = TestReducer::default();
        let env = test_env();
        let mut state = CoordinatorState::default();

        let effects = reducer.reduce(
            &mut state,
            SessionAction::IdentityChanged {
                snapshot: Some(snapshot("u1")),
            },
            &env,
        );

        assert_eq!(
            collect_actions(effects).await,
            vec![SessionAction::SyncProfile { generation: 1 }]
        );
    }

    #[test]
    fn same_uid_while_merging_is_ignored() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([
                SessionAction::IdentityChanged { snapshot: Some(snapshot("u1")) },
                SessionAction::SyncProfile { generation: 1 },
            ])
            .when_action(SessionAction::IdentityChanged {
                snapshot: Some(snapshot("u1")),
            })
            .then_state(|state| {
                assert_eq!(state.session, SessionState::Merging);
                assert_eq!(state.generation, 1);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn different_uid_reenters_identified() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([
                SessionAction::IdentityChanged { snapshot: Some(snapshot("u1")) },
                SessionAction::SyncProfile { generation: 1 },
            ])
            .when_action(SessionAction::IdentityChanged {
                snapshot: Some(snapshot("u2")),
            })
            .then_state(|state| {
                assert_eq!(state.session, SessionState::Identified);
                assert_eq!(state.generation, 2);
                assert_eq!(state.uid(), Some("u2"));
            })
            .run();
    }

    #[test]
    fn null_identity_clears_everything() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([
                SessionAction::IdentityChanged { snapshot: Some(snapshot("u1")) },
                SessionAction::SyncProfile { generation: 1 },
            ])
            .when_action(SessionAction::IdentityChanged { snapshot: None })
            .then_state(|state| {
                assert_eq!(state.session, SessionState::Unauthenticated);
                assert!(state.identity.is_none());
                assert!(state.combined.is_none());
                assert!(state.profile.is_none());
                assert_eq!(state.generation, 2);
            })
            .then_effects(|effects| {
                // Token cache is cleared.
                assertions::assert_effects_count(effects, 1);
            })
            .run();
    }

    #[test]
    fn repeated_null_identity_is_idempotent() {
        let reducer: TestReducer = CoordinatorReducer::default();
        let env = test_env();
        let mut state = CoordinatorState::default();

        let _ = reducer.reduce(&mut state, SessionAction::IdentityChanged { snapshot: None }, &env);
        let after_first = state.clone();
        let effects = reducer.reduce(&mut state, SessionAction::IdentityChanged { snapshot: None }, &env);

        assert_eq!(state, after_first);
        assertions::assert_no_effects(&effects);
    }

    #[test]
    fn listener_failure_surfaces_error() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .when_action(SessionAction::ListenerFailed {
                error: crate::error::ProviderError::Subscription("offline".into()),
            })
            .then_state(|state| {
                assert_eq!(state.listener, ListenerStatus::Failed);
                assert_eq!(
                    state.session.error(),
                    Some("Unable to reach the sign-in service. Please try again.")
                );
            })
            .run();
    }
}
