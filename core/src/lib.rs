//! # Sessionflow Core
//!
//! Core traits and types shared by the session coordinator crates.
//!
//! The coordinator is written as a reducer: a pure transition function over
//! an owned state, fed by actions and returning descriptions of side effects.
//! The runtime crate executes those descriptions and feeds the resulting
//! actions back in, one at a time.
//!
//! ## Core Concepts
//!
//! - **State**: Owned domain state (session state, identity, profile, ...)
//! - **Action**: Every input to a reducer (user commands, provider callbacks, async completions)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: A side effect description, executed later by the runtime
//! - **Environment**: Injected capabilities (identity provider, profile service, clock)
//!
//! ## Example
//!
//! ```
//! use sessionflow_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct Gate { open: bool }
//!
//! #[derive(Clone, Debug)]
//! enum GateAction { Open, Opened }
//!
//! struct GateReducer;
//!
//! impl Reducer for GateReducer {
//!     type State = Gate;
//!     type Action = GateAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Gate,
//!         action: GateAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<GateAction>; 4]> {
//!         match action {
//!             GateAction::Open => smallvec![Effect::Future(Box::pin(async { Some(GateAction::Opened) }))],
//!             GateAction::Opened => {
//!                 state.open = true;
//!                 smallvec![Effect::None]
//!             }
//!         }
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Declarative macros for building effects
pub mod effect_macros;

/// Reducer module - the transition function trait
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// The Reducer trait - all transition logic lives behind it.
    ///
    /// Reducers must stay free of I/O. Anything that talks to the outside
    /// world is returned as an [`Effect`] and executed by the runtime.
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer owns
    /// - `Action`: The inputs this reducer understands
    /// - `Environment`: The injected capabilities effects may capture
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// The effects to be executed by the runtime. Most actions produce
        /// zero to two effects, hence the inline capacity of four.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - side effect descriptions
///
/// Effects are values. Returning one from a reducer does nothing until the
/// runtime executes it.
pub mod effect {
    use futures::future::BoxFuture;
    use std::time::Duration;

    /// A boxed future that may feed one action back into the reducer.
    pub type EffectFuture<Action> = BoxFuture<'static, Option<Action>>;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently
        Parallel(Vec<Effect<Action>>),

        /// Run effects one after another, each to completion
        Sequential(Vec<Effect<Action>>),

        /// Dispatch an action after a delay
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after the delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// If the future resolves to `Some(action)`, the action is fed back
        /// into the reducer.
        Future(EffectFuture<Action>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Returns `true` for [`Effect::None`].
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }

        /// Number of leaf effects that will actually do work.
        ///
        /// `None` counts as zero, nested `Parallel`/`Sequential` are flattened.
        #[must_use]
        pub fn active_count(&self) -> usize {
            match self {
                Effect::None => 0,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().map(Effect::active_count).sum()
                },
                Effect::Delay { .. } | Effect::Future(_) => 1,
            }
        }
    }
}

/// Environment module - dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Command coalescing and transition timestamps read time through this
    /// trait so tests can pin or advance it.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::environment::{Clock, SystemClock};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    enum Ping {
        Pong,
    }

    #[test]
    fn active_count_ignores_none_and_flattens() {
        let effect: Effect<Ping> = Effect::merge(vec![
            Effect::None,
            Effect::Future(Box::pin(async { Some(Ping::Pong) })),
            Effect::chain(vec![
                Effect::Delay {
                    duration: Duration::from_millis(5),
                    action: Box::new(Ping::Pong),
                },
                Effect::None,
            ]),
        ]);

        assert_eq!(effect.active_count(), 2);
        assert!(Effect::<Ping>::None.is_none());
    }

    #[test]
    fn debug_hides_future_body() {
        let effect: Effect<Ping> = Effect::Future(Box::pin(async { None }));
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
