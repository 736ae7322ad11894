//! Token Manager.
//!
//! Hands out the identity provider's ID token as a bearer token. The last
//! token is cached in memory with the expiry read from its `exp` claim;
//! nothing is persisted here, the provider owns token storage.
//!
//! Once a session gate is attached (the coordinator does this on
//! construction) no token is handed out unless the session has a confirmed
//! identity.

use crate::error::{ProviderError, TokenError};
use crate::providers::IdentityProvider;
use crate::state::CoordinatorState;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sessionflow_core::environment::Clock;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, watch};

/// Bearer token with its expiry hint.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    /// Raw ID token.
    pub id_token: String,
    /// Expiry read from the token's `exp` claim, if it has one.
    pub expiration_hint: Option<DateTime<Utc>>,
}

impl Token {
    /// Build a token, reading the expiry from its claims.
    #[must_use]
    pub fn from_id_token(id_token: String) -> Self {
        let expiration_hint = expiry_from_claims(&id_token);
        Self {
            id_token,
            expiration_hint,
        }
    }

    /// Value for an `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.id_token)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("id_token", &format_args!("<{} bytes>", self.id_token.len()))
            .field("expiration_hint", &self.expiration_hint)
            .finish()
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

/// Read the `exp` claim of a JWT without verifying it.
///
/// The hint only drives cache reuse; the backend still validates the token.
fn expiry_from_claims(id_token: &str) -> Option<DateTime<Utc>> {
    let payload = id_token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

/// Source of bearer tokens for outbound requests.
pub trait BearerTokenSource: Send + Sync {
    /// Current bearer token, `None` without a session.
    ///
    /// # Errors
    ///
    /// Returns error if the provider failed to mint the token.
    fn bearer_token(&self) -> impl Future<Output = Result<Option<String>, TokenError>> + Send;
}

struct CachedToken {
    uid: String,
    token: Token,
}

/// Token Manager.
///
/// Cheap to clone; clones share the cache and the session gate.
pub struct TokenManager<P, C> {
    provider: P,
    clock: C,
    skew: Duration,
    cache: Arc<Mutex<Option<CachedToken>>>,
    gate: Arc<OnceLock<watch::Receiver<CoordinatorState>>>,
}

impl<P: Clone, C: Clone> Clone for TokenManager<P, C> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            clock: self.clock.clone(),
            skew: self.skew,
            cache: Arc::clone(&self.cache),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<P, C> TokenManager<P, C>
where
    P: IdentityProvider + Clone + 'static,
    C: Clock + Clone + 'static,
{
    /// Create a token manager.
    ///
    /// Cached tokens are reused until `skew` before their expiry.
    #[must_use]
    pub fn new(provider: P, clock: C, skew: Duration) -> Self {
        Self {
            provider,
            clock,
            skew,
            cache: Arc::new(Mutex::new(None)),
            gate: Arc::new(OnceLock::new()),
        }
    }

    /// Only hand out tokens while `state` reports a confirmed identity.
    ///
    /// Returns `false` if a gate was already attached.
    pub fn attach_gate(&self, state: watch::Receiver<CoordinatorState>) -> bool {
        self.gate.set(state).is_ok()
    }

    fn gate_open(&self) -> bool {
        self.gate
            .get()
            .is_none_or(|state| state.borrow().session.has_identity())
    }

    fn is_fresh(&self, token: &Token) -> bool {
        token
            .expiration_hint
            .is_some_and(|expiry| self.clock.now() < expiry - self.skew)
    }

    /// Current token.
    ///
    /// Waits for the provider to become ready. Returns `Ok(None)` when there
    /// is no session. `force_refresh` skips the cache and asks the provider
    /// for a freshly minted token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::FetchFailed`] if the provider fails to mint the
    /// token. No retry is attempted.
    pub async fn get_token(&self, force_refresh: bool) -> Result<Option<Token>, TokenError> {
        self.provider.ready().await;

        if !self.gate_open() {
            tracing::debug!("Token requested without a confirmed identity");
            return Ok(None);
        }

        let Some(user) = self.provider.current_user() else {
            self.clear().await;
            return Ok(None);
        };

        if !force_refresh {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.as_ref() {
                if cached.uid == user.uid && self.is_fresh(&cached.token) {
                    return Ok(Some(cached.token.clone()));
                }
            }
        }

        let raw = match self.provider.id_token(force_refresh).await {
            Ok(raw) => raw,
            Err(ProviderError::NoCurrentUser) => {
                self.clear().await;
                return Ok(None);
            },
            Err(error) => {
                tracing::debug!(error = %error, force_refresh, "Token fetch failed");
                return Err(TokenError::FetchFailed(error));
            },
        };

        let token = Token::from_id_token(raw);
        *self.cache.lock().await = Some(CachedToken {
            uid: user.uid,
            token: token.clone(),
        });

        Ok(Some(token))
    }

    /// Drop the cached token.
    pub async fn clear(&self) {
        self.cache.lock().await.take();
    }
}

impl<P, C> BearerTokenSource for TokenManager<P, C>
where
    P: IdentityProvider + Clone + 'static,
    C: Clock + Clone + 'static,
{
    fn bearer_token(&self) -> impl Future<Output = Result<Option<String>, TokenError>> + Send {
        let tokens = self.clone();

        async move {
            Ok(tokens.get_token(false).await?.map(|token| token.id_token))
        }
    }
}
