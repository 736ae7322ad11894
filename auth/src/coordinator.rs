//! Session coordinator.
//!
//! [`SessionCoordinator`] is the surface the UI talks to. It owns the store
//! that serializes every transition, the identity listener, and the token
//! manager, and exposes commands, queries and a change subscription.

use crate::actions::{Command, LoginMethod, SessionAction};
use crate::config::CoordinatorConfig;
use crate::environment::SessionEnvironment;
use crate::error::{CoordinatorError, Result};
use crate::listener::IdentityListener;
use crate::providers::{IdentityProvider, Navigator, ProfileService};
use crate::reducers::CoordinatorReducer;
use crate::state::{CoordinatorState, ListenerStatus, SessionState, SessionView, Transition};
use crate::token::{Token, TokenManager};
use sessionflow_core::environment::Clock;
use sessionflow_runtime::{EffectHandle, Store};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};

/// Store running the coordinator reducer.
pub type SessionStore<P, S, N, C> = Store<
    CoordinatorState,
    SessionAction,
    SessionEnvironment<P, S, N, C>,
    CoordinatorReducer<P, S, N, C>,
>;

/// Authentication session coordinator.
///
/// # Example
///
/// ```
/// use sessionflow_auth::mocks::{MockIdentityProvider, MockNavigator, MockProfileService};
/// use sessionflow_auth::providers::RawUser;
/// use sessionflow_auth::{CoordinatorConfig, SessionCoordinator, SessionState};
/// use sessionflow_core::environment::SystemClock;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> sessionflow_auth::Result<()> {
/// let identity = MockIdentityProvider::new().with_user(RawUser::new("u1"));
/// let coordinator = SessionCoordinator::new(
///     CoordinatorConfig::default(),
///     identity,
///     MockProfileService::new(),
///     MockNavigator::new(),
///     SystemClock,
/// );
///
/// coordinator.start().await?;
/// let view = coordinator
///     .wait_for(|view| view.state == SessionState::Authenticated, Duration::from_secs(1))
///     .await?;
/// assert_eq!(view.identity.map(|i| i.uid).as_deref(), Some("u1"));
///
/// coordinator.shutdown(Duration::from_secs(1)).await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionCoordinator<P, S, N, C>
where
    P: IdentityProvider + Clone + 'static,
    S: ProfileService + Clone + 'static,
    N: Navigator + Clone + 'static,
    C: Clock + Clone + 'static,
{
    store: SessionStore<P, S, N, C>,
    started: AtomicBool,
    listener: Mutex<Option<IdentityListener>>,
}

impl<P, S, N, C> SessionCoordinator<P, S, N, C>
where
    P: IdentityProvider + Clone + 'static,
    S: ProfileService + Clone + 'static,
    N: Navigator + Clone + 'static,
    C: Clock + Clone + 'static,
{
    /// Create a coordinator. Nothing happens until [`start`](Self::start).
    #[must_use]
    pub fn new(config: CoordinatorConfig, identity: P, profiles: S, navigator: N, clock: C) -> Self {
        let env = SessionEnvironment::new(identity, profiles, navigator, clock, config.token_expiry_skew);
        Self::from_environment(&config, env)
    }

    /// Create a coordinator around a prepared environment.
    ///
    /// Use this when collaborators need the token manager before the
    /// coordinator exists (see [`SessionEnvironment::with_tokens`]).
    #[must_use]
    pub fn from_environment(config: &CoordinatorConfig, env: SessionEnvironment<P, S, N, C>) -> Self {
        let state = CoordinatorState::with_history_capacity(config.history_capacity);
        let store = Store::new(state, CoordinatorReducer::new(config), env);

        if !store.environment().tokens.attach_gate(store.subscribe_state()) {
            tracing::warn!("Token manager already gated by another coordinator");
        }

        Self {
            store,
            started: AtomicBool::new(false),
            listener: Mutex::new(None),
        }
    }

    /// Subscribe to the identity provider.
    ///
    /// # Errors
    ///
    /// - [`CoordinatorError::AlreadyStarted`] once a call succeeded
    /// - [`CoordinatorError::Listener`] if the provider refused the
    ///   subscription (the session is then in `Error`; `start` may be
    ///   called again)
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(CoordinatorError::AlreadyStarted);
        }
        if self.store.is_shutting_down() {
            return Err(CoordinatorError::ShuttingDown);
        }

        if let Err(error) = self.attach_listener().await {
            self.started.store(false, Ordering::Release);
            return Err(error);
        }
        Ok(())
    }

    /// Sign in.
    ///
    /// Returns once the command is accepted; the outcome shows up in the
    /// session state. The handle resolves when the provider call finished.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ShuttingDown`] after shutdown began.
    pub async fn login(&self, method: LoginMethod) -> Result<EffectHandle> {
        self.dispatch(Command::login(method, self.now())).await
    }

    /// Sign out.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ShuttingDown`] after shutdown began.
    pub async fn logout(&self) -> Result<EffectHandle> {
        self.dispatch(Command::logout(self.now())).await
    }

    /// Re-read the provider session without prompting the user.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ShuttingDown`] after shutdown began.
    pub async fn re_authenticate(&self) -> Result<EffectHandle> {
        self.dispatch(Command::re_authenticate(self.now())).await
    }

    /// Clear the error and retry with the provider's current session.
    ///
    /// If subscribing to the provider had failed, the subscription is
    /// attempted again first.
    ///
    /// # Errors
    ///
    /// - [`CoordinatorError::NoErrorToDismiss`] unless the session is in `Error`
    /// - [`CoordinatorError::Listener`] if the provider refused the subscription again
    /// - [`CoordinatorError::ShuttingDown`] after shutdown began
    pub async fn dismiss_error(&self) -> Result<EffectHandle> {
        let (in_error, listener) = self
            .store
            .state(|state| (matches!(state.session, SessionState::Error { .. }), state.listener))
            .await;
        if !in_error {
            return Err(CoordinatorError::NoErrorToDismiss);
        }

        if listener == ListenerStatus::Failed {
            self.attach_listener().await?;
            self.started.store(true, Ordering::Release);
        }

        Ok(self.store.send(SessionAction::DismissError).await?)
    }

    /// Report the location the UI rendered, e.g. `?from=/billing`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ShuttingDown`] after shutdown began.
    pub async fn observe_location(&self, query: impl Into<String>) -> Result<()> {
        self.store
            .send(SessionAction::LocationObserved {
                query: query.into(),
            })
            .await?;
        Ok(())
    }

    /// Delete the current user's backend profile.
    ///
    /// # Errors
    ///
    /// - [`CoordinatorError::NoProfile`] unless a profile is loaded
    /// - [`CoordinatorError::ShuttingDown`] after shutdown began
    pub async fn delete_profile(&self) -> Result<EffectHandle> {
        let has_profile = self
            .store
            .state(|state| state.session.is_authenticated() && state.profile.is_some())
            .await;
        if !has_profile {
            return Err(CoordinatorError::NoProfile);
        }
        Ok(self.store.send(SessionAction::DeleteProfile).await?)
    }

    /// Bearer token for the current session, `None` without one.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Token`] if the provider fails to mint it.
    pub async fn get_token(&self, force_refresh: bool) -> Result<Option<Token>> {
        Ok(self.tokens().get_token(force_refresh).await?)
    }

    /// The token manager, for wiring outbound clients.
    #[must_use]
    pub fn tokens(&self) -> &TokenManager<P, C> {
        &self.store.environment().tokens
    }

    /// Current view.
    pub async fn view(&self) -> SessionView {
        self.store.state(CoordinatorState::view).await
    }

    /// Full coordinator state.
    pub async fn state(&self) -> CoordinatorState {
        self.store.state(Clone::clone).await
    }

    /// Recent transitions, oldest first.
    pub async fn history(&self) -> Vec<Transition> {
        self.store.state(|state| state.history.to_vec()).await
    }

    /// Subscribe to view changes.
    #[must_use]
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.store.subscribe_state())
    }

    /// Wait until the view satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Timeout`] if nothing matched in time.
    pub async fn wait_for<F>(&self, mut predicate: F, timeout: Duration) -> Result<SessionView>
    where
        F: FnMut(&SessionView) -> bool,
    {
        let state = self
            .store
            .wait_for(|state| predicate(&state.view()), timeout)
            .await?;
        Ok(state.view())
    }

    /// Detach from the provider and wait for in-flight work.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ShutdownTimeout`] if effects are still
    /// running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        tracing::info!("Shutting down session coordinator");

        if let Some(listener) = self.listener.lock().await.take() {
            listener.detach().await;
        }

        self.store.shutdown(timeout).await?;
        Ok(())
    }

    /// Attach the identity listener unless one is still running.
    async fn attach_listener(&self) -> Result<()> {
        let mut slot = self.listener.lock().await;
        if slot.as_ref().is_some_and(|listener| !listener.is_finished()) {
            return Ok(());
        }

        *slot = Some(IdentityListener::attach(&self.store).await?);
        Ok(())
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.store.environment().clock.now()
    }

    async fn dispatch(&self, command: Command) -> Result<EffectHandle> {
        Ok(self.store.send(SessionAction::Dispatch(command)).await?)
    }
}

/// Stream of [`SessionView`] changes.
///
/// Built on a watch channel: a slow reader sees the latest view rather than
/// every intermediate one. The transition history keeps the full sequence.
#[derive(Debug)]
pub struct SessionSubscription {
    state: watch::Receiver<CoordinatorState>,
    last: SessionView,
}

impl SessionSubscription {
    fn new(mut state: watch::Receiver<CoordinatorState>) -> Self {
        let last = state.borrow_and_update().view();
        Self { state, last }
    }

    /// Last view delivered (or the view at subscription time).
    #[must_use]
    pub const fn current(&self) -> &SessionView {
        &self.last
    }

    /// Next distinct view. `None` once the coordinator is gone.
    pub async fn changed(&mut self) -> Option<SessionView> {
        loop {
            self.state.changed().await.ok()?;
            let view = self.state.borrow_and_update().view();
            if view != self.last {
                self.last = view.clone();
                return Some(view);
            }
        }
    }
}
