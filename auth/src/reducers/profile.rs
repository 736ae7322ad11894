//! Profile Synchronizer.
//!
//! Fetches the backend profile once per identification and merges it with
//! the identity. Results are tagged with the identity generation they were
//! started for; anything that comes back for an older generation, or after
//! the session moved on, is dropped.
//!
//! A failed fetch does not block sign-in: the session becomes
//! `Authenticated` with identity-only data and a warning.

use super::{Effects, enter};
use crate::actions::SessionAction;
use crate::environment::SessionEnvironment;
use crate::error::ProfileError;
use crate::metrics::SessionMetrics;
use crate::providers::{IdentityProvider, Navigator, ProfileService};
use crate::state::{CombinedIdentity, CoordinatorState, Profile, SessionState};
use sessionflow_core::effect::Effect;
use sessionflow_core::environment::Clock;
use sessionflow_core::{SmallVec, smallvec};

/// Profile reducer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileReducer;

impl ProfileReducer {
    /// Reduce a profile action.
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
            SessionAction::SyncProfile { generation } => Self::sync(state, generation, env),
            SessionAction::ProfileLoaded { generation, result } => {
                Self::loaded(state, generation, result, env)
            },
            SessionAction::DeleteProfile => Self::delete(state, env),
            SessionAction::ProfileDeleted { generation, result } => {
                Self::deleted(state, generation, result);
                smallvec![Effect::None]
            },
            _ => SmallVec::new(),
        }
    }

    fn sync<P, S, N, C>(
        state: &mut CoordinatorState,
        generation: u64,
        env: &SessionEnvironment<P, S, N, C>,
    ) -> Effects
    where
        P: IdentityProvider + Clone + 'static,
        S: ProfileService + Clone + 'static,
        N: Navigator + Clone + 'static,
        C: Clock + Clone + 'static,
    {
        let identity = match &state.identity {
            Some(identity)
                if generation == state.generation && state.session == SessionState::Identified =>
            {
                identity.clone()
            },
            _ => {
                tracing::debug!(
                    generation,
                    current = state.generation,
                    "Profile sync superseded before it started"
                );
                return smallvec![Effect::None];
            },
        };

        enter(state, SessionState::Merging, &env.clock);
        tracing::debug!(uid = %identity.uid, generation, "Fetching profile");

        let profiles = env.profiles.clone();
        smallvec![Effect::Future(Box::pin(async move {
            let result = profiles.fetch_current_profile(&identity).await;
            Some(SessionAction::ProfileLoaded { generation, result })
        }))]
    }

    fn loaded<P, S, N, C>(
        state: &mut CoordinatorState,
        generation: u64,
        result: Result<Option<Profile>, ProfileError>,
        env: &SessionEnvironment<P, S, N, C>,
    ) -> Effects
    where
        P: IdentityProvider + Clone + 'static,
        S: ProfileService + Clone + 'static,
        N: Navigator + Clone + 'static,
        C: Clock + Clone + 'static,
    {
        let identity = match &state.identity {
            Some(identity)
                if generation == state.generation && state.session == SessionState::Merging =>
            {
                identity.clone()
            },
            _ => {
                tracing::debug!(
                    generation,
                    current = state.generation,
                    state = state.session.label(),
                    "Discarding stale profile result"
                );
                SessionMetrics::record_stale_profile();
                return smallvec![Effect::None];
            },
        };

        match result {
            Ok(profile) => {
                state.combined = Some(match &profile {
                    Some(profile) => CombinedIdentity::merge(&identity, profile),
                    None => CombinedIdentity::from_identity(&identity),
                });
                tracing::info!(
                    uid = %identity.uid,
                    has_profile = profile.is_some(),
                    "Session authenticated"
                );
                state.profile = profile;
                state.warning = None;
                enter(state, SessionState::Authenticated, &env.clock);

                // Pick up claims granted by the backend for this identity.
                let tokens = env.tokens.clone();
                smallvec![Effect::Future(Box::pin(async move {
                    if let Err(error) = tokens.get_token(true).await {
                        tracing::warn!(error = %error, "Token refresh after sign-in failed");
                    }
                    None
                }))]
            },
            Err(error) => {
                tracing::warn!(uid = %identity.uid, error = %error, "Profile fetch failed");
                SessionMetrics::record_profile_failure();
                state.combined = Some(CombinedIdentity::from_identity(&identity));
                state.profile = None;
                state.warning = Some(error.user_message().to_string());
                enter(state, SessionState::Authenticated, &env.clock);
                smallvec![Effect::None]
            },
        }
    }

    fn delete<P, S, N, C>(
        state: &CoordinatorState,
        env: &SessionEnvironment<P, S, N, C>,
    ) -> Effects
    where
        P: IdentityProvider + Clone + 'static,
        S: ProfileService + Clone + 'static,
        N: Navigator + Clone + 'static,
        C: Clock + Clone + 'static,
    {
        let Some(profile) = state
            .profile
            .clone()
            .filter(|_| state.session.is_authenticated())
        else {
            tracing::debug!("No profile to delete");
            return smallvec![Effect::None];
        };

        let generation = state.generation;
        let profiles = env.profiles.clone();
        smallvec![Effect::Future(Box::pin(async move {
            let result = profiles.delete_current_profile(&profile).await;
            Some(SessionAction::ProfileDeleted { generation, result })
        }))]
    }

    fn deleted(state: &mut CoordinatorState, generation: u64, result: Result<(), ProfileError>) {
        if generation != state.generation {
            tracing::debug!(generation, "Discarding stale profile deletion");
            return;
        }

        match result {
            Ok(()) => {
                tracing::info!(uid = ?state.uid(), "Profile deleted");
                state.profile = None;
                state.combined = state.identity.as_ref().map(CombinedIdentity::from_identity);
            },
            Err(error) => {
                tracing::warn!(error = %error, "Profile deletion failed");
                state.warning = Some(error.user_message().to_string());
            },
        }
    }
}
