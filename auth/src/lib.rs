//! # Sessionflow Authentication Session Coordinator
//!
//! Keeps an application's idea of "who is signed in" consistent with an
//! external identity provider and a backend profile service.
//!
//! ## Components
//!
//! - **Token Manager** ([`token`]): bearer tokens from the provider, cached
//!   in memory
//! - **Identity Provider Listener** ([`listener`]): one subscription to the
//!   provider's session-change stream
//! - **Session State Machine** ([`reducers::session`]): the authoritative
//!   [`SessionState`]
//! - **Profile Synchronizer** ([`reducers::profile`]): fetches and merges the
//!   backend profile, discarding stale results
//! - **Command Dispatcher** ([`reducers::commands`]): login, logout and
//!   re-authenticate with coalescing
//! - **Redirect Coordinator** ([`reducers::redirect`]): lands on the captured
//!   target once after authentication
//!
//! ## Architecture
//!
//! Every input becomes a [`SessionAction`] reduced by one store, so
//! transitions happen strictly one after another:
//!
//! ```text
//! Provider event ─┐
//! User command ───┼─→ Store → CoordinatorReducer → (State, Effects)
//! Effect result ──┘                                     │
//!        ↑                                              │
//!        └───────────── provider / backend calls ←──────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! let coordinator = SessionCoordinator::new(config, identity, profiles, navigator, SystemClock);
//! coordinator.start().await?;
//! coordinator.observe_location("?from=/billing").await?;
//! coordinator.login(LoginMethod::Interactive(ProviderKind::Google)).await?;
//!
//! let mut changes = coordinator.subscribe();
//! while let Some(view) = changes.changed().await {
//!     render(&view);
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod actions;
pub mod config;
pub mod coordinator;
pub mod environment;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod providers;
pub mod reducers;
pub mod state;
pub mod token;

/// Mock providers for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use actions::{Command, CommandKind, LoginMethod, ProviderKind, SessionAction};
pub use config::CoordinatorConfig;
pub use coordinator::{SessionCoordinator, SessionStore, SessionSubscription};
pub use environment::SessionEnvironment;
pub use error::{CoordinatorError, ProfileError, ProviderError, Result, TokenError};
pub use metrics::register_metrics;
pub use state::{
    CombinedIdentity, CoordinatorState, IdentitySnapshot, Profile, SessionState, SessionView,
    Transition,
};
pub use token::{BearerTokenSource, Token, TokenManager};
