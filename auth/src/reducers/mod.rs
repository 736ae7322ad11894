//! Coordinator reducers.
//!
//! Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
//! [`CoordinatorReducer`] routes each action to the component that owns it:
//!
//! - [`SessionReducer`]: listener lifecycle and identity callbacks
//! - [`ProfileReducer`]: profile fetch, merge and deletion
//! - [`CommandReducer`]: login, logout and re-authenticate
//! - [`RedirectReducer`]: captured navigation intent
//!
//! Landing after authentication is handled here, on the one transition that
//! matters: from anything else into `Authenticated`.

pub mod commands;
pub mod profile;
pub mod redirect;
pub mod session;

use crate::actions::SessionAction;
use crate::config::CoordinatorConfig;
use crate::environment::SessionEnvironment;
use crate::metrics::SessionMetrics;
use crate::providers::{IdentityProvider, Navigator, ProfileService};
use crate::state::{CoordinatorState, SessionState, Transition};
use sessionflow_core::environment::Clock;
use sessionflow_core::{SmallVec, effect::Effect, reducer::Reducer};
use std::marker::PhantomData;

pub use commands::CommandReducer;
pub use profile::ProfileReducer;
pub use redirect::RedirectReducer;
pub use session::SessionReducer;

/// Effects returned by the coordinator reducers.
pub type Effects = SmallVec<[Effect<SessionAction>; 4]>;

/// Move the session to `to`, recording the transition if the state changed.
pub(crate) fn enter<C: Clock>(state: &mut CoordinatorState, to: SessionState, clock: &C) {
    if state.session == to {
        return;
    }

    let from = std::mem::replace(&mut state.session, to.clone());
    tracing::debug!(
        from = from.label(),
        to = to.label(),
        generation = state.generation,
        "Session transition"
    );
    SessionMetrics::record_transition(&to);
    state.history.record(Transition {
        from,
        to,
        at: clock.now(),
        generation: state.generation,
    });
}

/// Unified coordinator reducer.
pub struct CoordinatorReducer<P, S, N, C> {
    session: SessionReducer,
    profile: ProfileReducer,
    commands: CommandReducer,
    redirect: RedirectReducer,
    _environment: PhantomData<fn() -> (P, S, N, C)>,
}

impl<P, S, N, C> Clone for CoordinatorReducer<P, S, N, C> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            profile: self.profile.clone(),
            commands: self.commands.clone(),
            redirect: self.redirect.clone(),
            _environment: PhantomData,
        }
    }
}

impl<P, S, N, C> CoordinatorReducer<P, S, N, C> {
    /// Create the reducer from the coordinator configuration.
    #[must_use]
    pub fn new(config: &CoordinatorConfig) -> Self {
        Self {
            session: SessionReducer,
            profile: ProfileReducer,
            commands: CommandReducer::new(config.coalesce_window),
            redirect: RedirectReducer::new(
                config.redirect_param.clone(),
                config.default_landing_path.clone(),
            ),
            _environment: PhantomData,
        }
    }
}

impl<P, S, N, C> Default for CoordinatorReducer<P, S, N, C> {
    fn default() -> Self {
        Self::new(&CoordinatorConfig::default())
    }
}

impl<P, S, N, C> Reducer for CoordinatorReducer<P, S, N, C>
where
    P: IdentityProvider + Clone + 'static,
    S: ProfileService + Clone + 'static,
    N: Navigator + Clone + 'static,
    C: Clock + Clone + 'static,
{
    type State = CoordinatorState;
    type Action = SessionAction;
    type Environment = SessionEnvironment<P, S, N, C>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects {
        let was_authenticated = state.session.is_authenticated();

        // Route to the component that owns the action
        let mut effects = match action {
            // Listener and identity callbacks
            SessionAction::ListenerAttached
            | SessionAction::ListenerFailed { .. }
            | SessionAction::IdentityChanged { .. } => self.session.reduce(state, action, env),

            // Profile synchronization
            SessionAction::SyncProfile { .. }
            | SessionAction::ProfileLoaded { .. }
            | SessionAction::DeleteProfile
            | SessionAction::ProfileDeleted { .. } => self.profile.reduce(state, action, env),

            // Commands
            SessionAction::Dispatch(_)
            | SessionAction::CommandFinished { .. }
            | SessionAction::DismissError => self.commands.reduce(state, action, env),

            // Redirect capture
            SessionAction::LocationObserved { query } => self.redirect.capture(state, &query),
        };

        if !was_authenticated && state.session.is_authenticated() {
            effects.push(self.redirect.land(state, env));
        }

        effects
    }
}
