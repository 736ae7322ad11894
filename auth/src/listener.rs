//! Identity Provider Listener.
//!
//! Holds the one subscription to the provider's session-change stream and
//! forwards every event, normalized, to the store in emission order. Each
//! event is fully reduced before the next one is read.

use crate::actions::SessionAction;
use crate::coordinator::SessionStore;
use crate::error::{CoordinatorError, Result};
use crate::providers::{IdentityProvider, Navigator, ProfileService};
use crate::state::IdentitySnapshot;
use sessionflow_core::environment::Clock;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Running listener task.
///
/// Dropping the listener without [`detach`](Self::detach) leaves the task
/// running until the provider closes the stream.
#[derive(Debug)]
pub struct IdentityListener {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl IdentityListener {
    /// Subscribe to the provider and start forwarding events.
    ///
    /// Reports `ListenerAttached` (or `ListenerFailed`) to the store before
    /// the first event is forwarded.
    ///
    /// # Errors
    ///
    /// - [`CoordinatorError::Listener`] if the provider refused the subscription
    /// - [`CoordinatorError::ShuttingDown`] if the store no longer accepts actions
    pub async fn attach<P, S, N, C>(store: &SessionStore<P, S, N, C>) -> Result<Self>
    where
        P: IdentityProvider + Clone + 'static,
        S: ProfileService + Clone + 'static,
        N: Navigator + Clone + 'static,
        C: Clock + Clone + 'static,
    {
        let mut subscription = match store.environment().identity.subscribe().await {
            Ok(subscription) => subscription,
            Err(error) => {
                tracing::error!(error = %error, "Failed to subscribe to identity changes");
                store
                    .send(SessionAction::ListenerFailed {
                        error: error.clone(),
                    })
                    .await?;
                return Err(CoordinatorError::Listener(error));
            },
        };

        // On error the subscription is dropped here, which unsubscribes.
        store.send(SessionAction::ListenerAttached).await?;

        let (stop, mut stopped) = oneshot::channel();
        let store = store.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stopped => break,
                    event = subscription.next() => {
                        let Some(user) = event else {
                            tracing::info!("Identity provider closed the session stream");
                            break;
                        };
                        let snapshot = user.map(IdentitySnapshot::from);
                        tracing::debug!(uid = ?snapshot.as_ref().map(|s| &s.uid), "Identity event");
                        if store.send(SessionAction::IdentityChanged { snapshot }).await.is_err() {
                            break;
                        }
                    }
                }
            }

            subscription.close();
            tracing::info!("Identity listener detached");
        });

        Ok(Self {
            stop: Some(stop),
            task,
        })
    }

    /// Stop forwarding and release the subscription.
    pub async fn detach(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(error) = (&mut self.task).await {
            tracing::warn!(error = %error, "Identity listener task ended abnormally");
        }
    }

    /// Returns `true` once the forwarding task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
