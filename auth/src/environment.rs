//! Coordinator environment.
//!
//! This module defines the environment type for dependency injection
//! in the coordinator reducers.

use crate::providers::{IdentityProvider, Navigator, ProfileService};
use crate::token::TokenManager;
use chrono::Duration;
use sessionflow_core::environment::Clock;

/// Coordinator environment.
///
/// Contains all external dependencies needed by the coordinator reducers.
///
/// # Type Parameters
///
/// - `P`: Identity provider
/// - `S`: Backend profile service
/// - `N`: Navigator
/// - `C`: Clock
#[derive(Clone)]
pub struct SessionEnvironment<P, S, N, C>
where
    P: IdentityProvider + Clone,
    S: ProfileService + Clone,
    N: Navigator + Clone,
    C: Clock + Clone,
{
    /// Identity provider.
    pub identity: P,

    /// Backend profile service.
    pub profiles: S,

    /// Router of the embedding UI.
    pub navigator: N,

    /// Clock for command coalescing and transition timestamps.
    pub clock: C,

    /// Token manager wrapping `identity`.
    pub tokens: TokenManager<P, C>,
}

impl<P, S, N, C> SessionEnvironment<P, S, N, C>
where
    P: IdentityProvider + Clone + 'static,
    S: ProfileService + Clone,
    N: Navigator + Clone,
    C: Clock + Clone + 'static,
{
    /// Create an environment; the token manager is built from `identity`.
    #[must_use]
    pub fn new(identity: P, profiles: S, navigator: N, clock: C, token_expiry_skew: Duration) -> Self {
        let tokens = TokenManager::new(identity.clone(), clock.clone(), token_expiry_skew);
        Self::with_tokens(identity, profiles, navigator, clock, tokens)
    }

    /// Create an environment around an existing token manager.
    ///
    /// Use this when the profile service shares the token manager, e.g. as
    /// its bearer token source.
    #[must_use]
    pub const fn with_tokens(
        identity: P,
        profiles: S,
        navigator: N,
        clock: C,
        tokens: TokenManager<P, C>,
    ) -> Self {
        Self {
            identity,
            profiles,
            navigator,
            clock,
            tokens,
        }
    }
}
