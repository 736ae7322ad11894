//! # Sessionflow Runtime
//!
//! The [`Store`] coordinates reducer execution and effect handling.
//!
//! ## Guarantees
//!
//! - Actions are reduced one at a time behind a write lock, so no reader ever
//!   observes a half-applied transition.
//! - Effects run on the tokio runtime; actions they produce are fed back
//!   through [`Store::send`] and reduced in the order they are sent.
//! - Every state change is published on a `watch` channel while the write
//!   lock is still held, so subscribers see changes in reduction order.
//!
//! ## Example
//!
//! ```ignore
//! use sessionflow_runtime::Store;
//!
//! let store = Store::new(initial_state, reducer, environment);
//!
//! store.send(Action::Start).await?;
//!
//! let phase = store.state(|s| s.phase.clone()).await;
//! ```

use sessionflow_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// Prometheus metrics for observability
pub mod metrics;

use metrics::StoreMetrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a state predicate
        #[error("Timeout waiting for state")]
        Timeout,

        /// State channel closed
        ///
        /// Every sender is gone, which only happens once the store itself
        /// has been dropped.
        #[error("State channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of the action broadcast channel
    pub action_buffer: usize,
    /// Timeout used by [`Store::shutdown_default`]
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Create a new store configuration
    #[must_use]
    pub const fn new(action_buffer: usize, default_shutdown_timeout: Duration) -> Self {
        Self {
            action_buffer,
            default_shutdown_timeout,
        }
    }

    /// Set the action broadcast capacity
    #[must_use]
    pub const fn with_action_buffer(mut self, capacity: usize) -> Self {
        self.action_buffer = capacity;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            action_buffer: 64,
            default_shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`]. Waiting on it resolves once every effect
/// produced directly by that action has finished, including the reduction
/// of any action those effects fed back. Effects spawned by the fed-back
/// actions are not tracked.
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (handle, _tracking) = Self::new();
        handle
    }

    /// Number of tracked effects still running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all tracked effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // Every tracker is gone, nothing can still be running.
                break;
            }
        }
    }

    /// Wait for all tracked effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires first.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: effect counter shared between a handle and running effects
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements the effect counter on drop
///
/// Runs even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements the store-wide pending counter on drop
struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        let pending = counter.fetch_add(1, Ordering::SeqCst) + 1;
        StoreMetrics::record_pending(pending);
        Self(Arc::clone(counter))
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let pending = self.0.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        StoreMetrics::record_pending(pending);
    }
}

/// Store module - the runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicUsize, DecrementGuard, Duration, Effect, EffectHandle,
        EffectTracking, Ordering, PendingGuard, Reducer, RwLock, StoreConfig, StoreError,
        StoreMetrics,
    };
    use tokio::sync::{broadcast, watch};

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store owns:
    /// 1. State (behind an `RwLock`; written only by the reducer)
    /// 2. Reducer (transition logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        config: StoreConfig,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        action_broadcast: broadcast::Sender<A>,
        state_watch: Arc<watch::Sender<S>>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Clone + PartialEq + Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with default configuration
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new store with custom configuration
        #[must_use]
        pub fn with_config(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self {
            let (action_broadcast, _) = broadcast::channel(config.action_buffer.max(1));
            let (state_watch, _) = watch::channel(initial_state.clone());

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                config,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                action_broadcast,
                state_watch: Arc::new(state_watch),
            }
        }

        /// The environment this store was built with
        #[must_use]
        pub const fn environment(&self) -> &E {
            &self.environment
        }

        /// Number of effects currently running across all actions
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Returns `true` once [`shutdown`](Self::shutdown) has been called
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        /// Send an action to the store
        ///
        /// The action is reduced before this returns. Effects are spawned and
        /// tracked by the returned handle.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] after shutdown began.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError>
        where
            R: Clone,
            E: Clone,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                StoreMetrics::record_rejected();
                return Err(StoreError::ShutdownInProgress);
            }

            tracing::debug!("Processing action");

            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;
                tracing::trace!("Acquired write lock on state");

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut state, action, &self.environment);
                StoreMetrics::record_action(start.elapsed(), effects.len());

                // Publish while still holding the write lock so subscribers
                // observe changes in reduction order.
                self.state_watch.send_if_modified(|published| {
                    if *published == *state {
                        false
                    } else {
                        published.clone_from(&state);
                        true
                    }
                });

                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            for effect in effects {
                self.execute_effect(effect, tracking.clone());
            }

            Ok(handle)
        }

        /// Read state via a closure
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Subscribe to every state change
        ///
        /// The receiver starts out marked as seen; `changed()` resolves on
        /// the next transition.
        #[must_use]
        pub fn subscribe_state(&self) -> watch::Receiver<S> {
            self.state_watch.subscribe()
        }

        /// Subscribe to actions produced by effects
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Wait until the state satisfies `predicate`
        ///
        /// Returns a clone of the first state that matched. The current state
        /// is checked first.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`] if nothing matched in time
        /// - [`StoreError::ChannelClosed`] if the state channel closed
        pub async fn wait_for<F>(&self, predicate: F, timeout: Duration) -> Result<S, StoreError>
        where
            F: FnMut(&S) -> bool,
        {
            let mut rx = self.state_watch.subscribe();
            let waited = tokio::time::timeout(timeout, async move {
                rx.wait_for(predicate)
                    .await
                    .map(|state| state.clone())
                    .map_err(|_| StoreError::ChannelClosed)
            })
            .await;

            waited.map_err(|_| StoreError::Timeout)?
        }

        /// Stop accepting actions and wait for running effects
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] with the number of effects
        /// still running when `timeout` elapses.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    StoreMetrics::record_shutdown("completed");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(
                        pending_effects = pending,
                        "Shutdown timeout: {} effects still running", pending
                    );
                    StoreMetrics::record_shutdown("timeout");
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Shut down using the configured default timeout
        ///
        /// # Errors
        ///
        /// See [`shutdown`](Self::shutdown).
        pub async fn shutdown_default(&self) -> Result<(), StoreError> {
            self.shutdown(self.config.default_shutdown_timeout).await
        }

        #[tracing::instrument(skip(self, effect, tracking), name = "execute_effect")]
        fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking)
        where
            R: Clone,
            E: Clone,
        {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                },
                Effect::Future(fut) => {
                    StoreMetrics::record_effect("future");
                    tracking.increment();
                    let pending = PendingGuard::acquire(&self.pending_effects);
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking);
                        let _pending = pending;

                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");

                            // Broadcast to observers before reduction
                            let _ = store.action_broadcast.send(action.clone());
                            if let Err(error) = store.send(action).await {
                                tracing::debug!(error = %error, "Dropped effect output");
                            }
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    StoreMetrics::record_effect("delay");
                    tracking.increment();
                    let pending = PendingGuard::acquire(&self.pending_effects);
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking);
                        let _pending = pending;

                        tokio::time::sleep(duration).await;

                        let _ = store.action_broadcast.send((*action).clone());
                        if let Err(error) = store.send(*action).await {
                            tracing::debug!(error = %error, "Dropped delayed action");
                        }
                    });
                },
                Effect::Parallel(effects) => {
                    StoreMetrics::record_effect("parallel");
                    for effect in effects {
                        self.execute_effect(effect, tracking.clone());
                    }
                },
                Effect::Sequential(effects) => {
                    StoreMetrics::record_effect("sequential");
                    tracking.increment();
                    let pending = PendingGuard::acquire(&self.pending_effects);
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking);
                        let _pending = pending;

                        for effect in effects {
                            let (mut step, step_tracking) = EffectHandle::new();
                            store.execute_effect(effect, step_tracking);
                            step.wait().await;
                        }
                        tracing::trace!("Effect::Sequential completed");
                    });
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                config: self.config.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                action_broadcast: self.action_broadcast.clone(),
                state_watch: Arc::clone(&self.state_watch),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
