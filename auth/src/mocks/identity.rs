//! Mock identity provider.

use crate::actions::ProviderKind;
use crate::error::ProviderError;
use crate::providers::{IdentityProvider, ProviderSubscription, RawUser};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use sessionflow_core::environment::{Clock, SystemClock};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Semaphore, mpsc};

/// Build an unsigned JWT carrying `sub` and `exp` claims.
///
/// `serial` ends up in the `jti` claim so consecutive tokens differ.
#[must_use]
pub fn fake_id_token(uid: &str, expires_at: DateTime<Utc>, serial: u64) -> String {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = engine.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = serde_json::json!({
        "sub": uid,
        "exp": expires_at.timestamp(),
        "jti": serial,
    });
    let payload = engine.encode(claims.to_string());
    format!("{header}.{payload}.mock")
}

/// A recorded sign-in attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInCall {
    /// Interactive flow with a provider.
    Interactive(ProviderKind),
    /// Email/password sign-in.
    Credentials {
        /// Email used
        email: String,
    },
}

#[derive(Default)]
struct Inner {
    current: Option<RawUser>,
    sign_in_user: Option<RawUser>,
    subscribers: Vec<mpsc::UnboundedSender<Option<RawUser>>>,
    sign_in_calls: Vec<SignInCall>,
    sign_out_calls: usize,
    subscribe_calls: usize,
    token_requests: Vec<bool>,
    token_serial: u64,
    sign_in_failures: VecDeque<ProviderError>,
    sign_out_failure: Option<ProviderError>,
    token_failure: Option<ProviderError>,
    subscribe_failure: Option<ProviderError>,
    hold_sign_in: bool,
}

/// Mock identity provider.
///
/// Behaves like a hosted identity service: the subscription fires once with
/// the current user when registered, and sign-in/sign-out are reported
/// through it before the call returns.
#[derive(Clone)]
pub struct MockIdentityProvider {
    inner: Arc<Mutex<Inner>>,
    sign_in_release: Arc<Semaphore>,
    unsubscribes: Arc<AtomicUsize>,
    clock: Arc<dyn Clock>,
}

impl MockIdentityProvider {
    /// Create a provider with no session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            sign_in_release: Arc::new(Semaphore::new(0)),
            unsubscribes: Arc::new(AtomicUsize::new(0)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for token expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Start with a restored session for `user`.
    #[must_use]
    pub fn with_user(self, user: RawUser) -> Self {
        self.lock().current = Some(user);
        self
    }

    /// User that becomes current after a successful sign-in.
    #[must_use]
    pub fn with_sign_in_user(self, user: RawUser) -> Self {
        self.lock().sign_in_user = Some(user);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn broadcast(inner: &mut Inner, user: Option<RawUser>) {
        inner.current.clone_from(&user);
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(user.clone()).is_ok());
    }

    /// Report a session change to every subscriber.
    pub fn emit(&self, user: Option<RawUser>) {
        Self::broadcast(&mut self.lock(), user);
    }

    /// Replace the current user without notifying subscribers.
    pub fn set_current_user(&self, user: Option<RawUser>) {
        self.lock().current = user;
    }

    /// Fail the next sign-in with `error`.
    pub fn fail_next_sign_in(&self, error: ProviderError) {
        self.lock().sign_in_failures.push_back(error);
    }

    /// Fail the next sign-out with `error`.
    pub fn fail_next_sign_out(&self, error: ProviderError) {
        self.lock().sign_out_failure = Some(error);
    }

    /// Fail the next token request with `error`.
    pub fn fail_token(&self, error: ProviderError) {
        self.lock().token_failure = Some(error);
    }

    /// Fail the next subscribe with `error`.
    pub fn fail_subscribe(&self, error: ProviderError) {
        self.lock().subscribe_failure = Some(error);
    }

    /// Make sign-ins wait until [`release_sign_in`](Self::release_sign_in).
    pub fn hold_sign_in(&self) {
        self.lock().hold_sign_in = true;
    }

    /// Let `count` held sign-ins finish.
    pub fn release_sign_in(&self, count: usize) {
        self.sign_in_release.add_permits(count);
    }

    /// Recorded sign-in attempts.
    #[must_use]
    pub fn sign_in_calls(&self) -> Vec<SignInCall> {
        self.lock().sign_in_calls.clone()
    }

    /// Number of sign-out calls.
    #[must_use]
    pub fn sign_out_calls(&self) -> usize {
        self.lock().sign_out_calls
    }

    /// Number of subscribe calls.
    #[must_use]
    pub fn subscribe_calls(&self) -> usize {
        self.lock().subscribe_calls
    }

    /// Number of subscriptions that were closed.
    #[must_use]
    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    /// `force_refresh` flag of every token request, in order.
    #[must_use]
    pub fn token_requests(&self) -> Vec<bool> {
        self.lock().token_requests.clone()
    }

    fn record_sign_in(&self, call: SignInCall) -> bool {
        let mut inner = self.lock();
        inner.sign_in_calls.push(call);
        inner.hold_sign_in
    }

    async fn wait_for_release(&self, held: bool) {
        if held {
            if let Ok(permit) = self.sign_in_release.acquire().await {
                permit.forget();
            }
        }
    }

    fn complete_sign_in(&self, fallback_uid: &str) -> Result<(), ProviderError> {
        let mut inner = self.lock();
        if let Some(error) = inner.sign_in_failures.pop_front() {
            return Err(error);
        }

        let user = inner
            .sign_in_user
            .clone()
            .unwrap_or_else(|| RawUser::new(fallback_uid));
        Self::broadcast(&mut inner, Some(user));
        Ok(())
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MockIdentityProvider")
            .field("current", &inner.current)
            .field("subscribers", &inner.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl IdentityProvider for MockIdentityProvider {
    fn subscribe(&self) -> impl Future<Output = Result<ProviderSubscription, ProviderError>> + Send {
        let this = self.clone();

        async move {
            let mut inner = this.lock();
            inner.subscribe_calls += 1;
            if let Some(error) = inner.subscribe_failure.take() {
                return Err(error);
            }

            let (tx, rx) = mpsc::unbounded_channel();
            // Initial state is reported on registration.
            let _ = tx.send(inner.current.clone());
            inner.subscribers.push(tx);
            drop(inner);

            let unsubscribes = Arc::clone(&this.unsubscribes);
            Ok(ProviderSubscription::new(rx, move || {
                unsubscribes.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    fn sign_in_interactive(
        &self,
        provider: ProviderKind,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send {
        let this = self.clone();

        async move {
            let held = this.record_sign_in(SignInCall::Interactive(provider));
            this.wait_for_release(held).await;
            this.complete_sign_in(&format!("{}-user", provider.as_str()))
        }
    }

    fn sign_in_with_credential(
        &self,
        email: &str,
        _password: &str,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send {
        let this = self.clone();
        let email = email.to_string();

        async move {
            let held = this.record_sign_in(SignInCall::Credentials { email: email.clone() });
            this.wait_for_release(held).await;
            this.complete_sign_in(&email)
        }
    }

    fn sign_out(&self) -> impl Future<Output = Result<(), ProviderError>> + Send {
        let this = self.clone();

        async move {
            let mut inner = this.lock();
            inner.sign_out_calls += 1;
            if let Some(error) = inner.sign_out_failure.take() {
                return Err(error);
            }
            Self::broadcast(&mut inner, None);
            Ok(())
        }
    }

    fn current_user(&self) -> Option<RawUser> {
        self.lock().current.clone()
    }

    fn id_token(&self, force_refresh: bool) -> impl Future<Output = Result<String, ProviderError>> + Send {
        let this = self.clone();

        async move {
            let now = this.clock.now();
            let mut inner = this.lock();
            let Some(uid) = inner.current.as_ref().map(|user| user.uid.clone()) else {
                return Err(ProviderError::NoCurrentUser);
            };

            inner.token_requests.push(force_refresh);
            if let Some(error) = inner.token_failure.take() {
                return Err(error);
            }

            inner.token_serial += 1;
            Ok(fake_id_token(&uid, now + Duration::hours(1), inner.token_serial))
        }
    }

    fn ready(&self) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }
}
