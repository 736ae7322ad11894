//! Identity provider trait.

use crate::actions::ProviderKind;
use crate::error::ProviderError;
use std::future::Future;
use tokio::sync::mpsc;

/// User object as the identity provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawUser {
    /// Provider-assigned user id.
    pub uid: String,
    /// Email address.
    pub email: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Avatar URL.
    pub photo_url: Option<String>,
    /// Email verification flag.
    pub email_verified: bool,
    /// Phone number.
    pub phone_number: Option<String>,
}

impl RawUser {
    /// Create a user with only a uid.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
            email_verified: false,
            phone_number: None,
        }
    }

    /// Set the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Live registration with the provider's session-change stream.
///
/// Events arrive in emission order. The unsubscribe hook runs exactly once,
/// either through [`close`](Self::close) or when the subscription is dropped.
pub struct ProviderSubscription {
    events: mpsc::UnboundedReceiver<Option<RawUser>>,
    unsubscribe: Option<Unsubscribe>,
}

impl ProviderSubscription {
    /// Wrap an event receiver and the hook that detaches it.
    pub fn new(
        events: mpsc::UnboundedReceiver<Option<RawUser>>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            events,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Next session change. `None` once the provider closed the stream.
    pub async fn next(&mut self) -> Option<Option<RawUser>> {
        self.events.recv().await
    }

    /// Detach from the provider. Later calls do nothing.
    pub fn close(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            self.events.close();
            unsubscribe();
        }
    }

    /// Returns `true` once [`close`](Self::close) ran.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.unsubscribe.is_none()
    }
}

impl Drop for ProviderSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ProviderSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSubscription")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Identity provider.
///
/// Abstracts the hosted identity service: its session-change stream, its
/// sign-in flows and its token accessor.
///
/// # Implementation Notes
///
/// - Successful sign-in and sign-out must also be reported through the
///   subscription stream; the coordinator relies on that to close the loop.
/// - `current_user` must not block.
pub trait IdentityProvider: Send + Sync {
    /// Register for session changes.
    ///
    /// # Errors
    ///
    /// Returns error if the provider cannot register the listener.
    fn subscribe(&self) -> impl Future<Output = Result<ProviderSubscription, ProviderError>> + Send;

    /// Run an interactive sign-in flow (popup or redirect).
    ///
    /// # Errors
    ///
    /// Returns error if the user cancels, the popup is blocked, or the
    /// provider rejects the sign-in.
    fn sign_in_interactive(
        &self,
        provider: ProviderKind,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns error if the credentials are rejected or the provider is
    /// unreachable.
    fn sign_in_with_credential(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Sign out the current user.
    ///
    /// # Errors
    ///
    /// Returns error if the provider fails to end the session.
    fn sign_out(&self) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// The signed-in user, if any.
    fn current_user(&self) -> Option<RawUser>;

    /// ID token of the current user.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NoCurrentUser`] without a session, or the
    /// provider's failure while minting a fresh token.
    fn id_token(&self, force_refresh: bool) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Resolves once the provider restored its persisted session.
    fn ready(&self) -> impl Future<Output = ()> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn unsubscribe_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let counter = Arc::clone(&calls);
        let mut subscription = ProviderSubscription::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tx.send(Some(RawUser::new("u1"))).unwrap();
        assert_eq!(subscription.next().await, Some(Some(RawUser::new("u1"))));

        subscription.close();
        subscription.close();
        drop(subscription);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_unsubscribes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = mpsc::unbounded_channel();
        let counter = Arc::clone(&calls);

        drop(ProviderSubscription::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
