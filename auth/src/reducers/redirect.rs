//! Redirect Coordinator.
//!
//! Remembers where an unauthenticated visitor was headed (the `from` query
//! parameter of the login page) and lands there once, after the session
//! first becomes `Authenticated`. Without a captured target the landing goes
//! to the default path.

use super::Effects;
use crate::actions::SessionAction;
use crate::environment::SessionEnvironment;
use crate::providers::{IdentityProvider, Navigator, ProfileService};
use crate::state::{CoordinatorState, SessionState};
use sessionflow_core::effect::Effect;
use sessionflow_core::environment::Clock;
use sessionflow_core::async_effect;
use sessionflow_core::smallvec;

/// Redirect reducer.
#[derive(Debug, Clone)]
pub struct RedirectReducer {
    param: String,
    default_landing_path: String,
}

impl RedirectReducer {
    /// Create a redirect reducer reading `param` and falling back to
    /// `default_landing_path`.
    #[must_use]
    pub fn new(param: impl Into<String>, default_landing_path: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            default_landing_path: default_landing_path.into(),
        }
    }

    /// Capture the target from a rendered location's query string.
    ///
    /// Only the first location seen before authentication is inspected.
    pub fn capture(&self, state: &mut CoordinatorState, query: &str) -> Effects {
        let before_authentication = matches!(
            state.session,
            SessionState::Uninitialized | SessionState::Authenticating | SessionState::Unauthenticated
        );

        if state.redirect.captured || !before_authentication {
            return smallvec![Effect::None];
        }

        state.redirect.captured = true;
        state.redirect.target_path = target_from_query(query, &self.param);
        tracing::debug!(target = ?state.redirect.target_path, "Redirect target captured");

        smallvec![Effect::None]
    }

    /// Navigation to run on entering `Authenticated`, at most once per visit.
    pub fn land<P, S, N, C>(
        &self,
        state: &mut CoordinatorState,
        env: &SessionEnvironment<P, S, N, C>,
    ) -> Effect<SessionAction>
    where
        P: IdentityProvider + Clone + 'static,
        S: ProfileService + Clone + 'static,
        N: Navigator + Clone + 'static,
        C: Clock + Clone + 'static,
    {
        if state.redirect.replayed {
            return Effect::None;
        }

        state.redirect.replayed = true;
        let path = state
            .redirect
            .target_path
            .take()
            .unwrap_or_else(|| self.default_landing_path.clone());

        tracing::info!(path = %path, "Landing after authentication");
        let navigator = env.navigator.clone();
        async_effect! {
            navigator.navigate(&path, true);
            None
        }
    }
}

/// Read `param` from `query` if it holds an in-app path.
fn target_from_query(query: &str, param: &str) -> Option<String> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(query.trim_start_matches('?')).ok()?;

    pairs
        .into_iter()
        .find(|(key, _)| key == param)
        .map(|(_, value)| value)
        .filter(|path| is_app_path(path))
}

/// Only absolute paths within the app are followed.
fn is_app_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains("://") && !path.contains('\\')
}
