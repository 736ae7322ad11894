//! Mock profile service.

use crate::error::ProfileError;
use crate::providers::ProfileService;
use crate::state::{IdentitySnapshot, Profile};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

#[derive(Default)]
struct Inner {
    profiles: HashMap<String, Profile>,
    failure: Option<ProfileError>,
    delete_failure: Option<ProfileError>,
    fetches: Vec<String>,
    deletions: Vec<String>,
    hold: bool,
}

/// Mock profile service.
///
/// Profiles are keyed by identity uid. Fetches can be held to test results
/// that arrive late.
#[derive(Clone)]
pub struct MockProfileService {
    inner: Arc<Mutex<Inner>>,
    release: Arc<Semaphore>,
}

impl MockProfileService {
    /// Create a service with no profiles.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            release: Arc::new(Semaphore::new(0)),
        }
    }

    /// Store `profile` for `uid`.
    #[must_use]
    pub fn with_profile(self, uid: impl Into<String>, profile: Profile) -> Self {
        self.insert(uid, profile);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `profile` for `uid`.
    pub fn insert(&self, uid: impl Into<String>, profile: Profile) {
        self.lock().profiles.insert(uid.into(), profile);
    }

    /// Fail every fetch with `error` until [`recover`](Self::recover).
    pub fn fail_with(&self, error: ProfileError) {
        self.lock().failure = Some(error);
    }

    /// Stop failing fetches.
    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Fail the next deletion with `error`.
    pub fn fail_next_delete(&self, error: ProfileError) {
        self.lock().delete_failure = Some(error);
    }

    /// Make fetches wait until [`release_fetches`](Self::release_fetches).
    pub fn hold_fetches(&self) {
        self.lock().hold = true;
    }

    /// Let `count` held fetches finish.
    pub fn release_fetches(&self, count: usize) {
        self.release.add_permits(count);
    }

    /// Uids fetched so far, in order.
    #[must_use]
    pub fn fetches(&self) -> Vec<String> {
        self.lock().fetches.clone()
    }

    /// Profile ids deleted so far.
    #[must_use]
    pub fn deletions(&self) -> Vec<String> {
        self.lock().deletions.clone()
    }
}

impl Default for MockProfileService {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileService for MockProfileService {
    fn fetch_current_profile(
        &self,
        identity: &IdentitySnapshot,
    ) -> impl Future<Output = Result<Option<Profile>, ProfileError>> + Send {
        let this = self.clone();
        let uid = identity.uid.clone();

        async move {
            let held = {
                let mut inner = this.lock();
                inner.fetches.push(uid.clone());
                inner.hold
            };

            if held {
                if let Ok(permit) = this.release.acquire().await {
                    permit.forget();
                }
            }

            let inner = this.lock();
            if let Some(error) = inner.failure.clone() {
                return Err(error);
            }
            Ok(inner.profiles.get(&uid).cloned())
        }
    }

    fn delete_current_profile(
        &self,
        profile: &Profile,
    ) -> impl Future<Output = Result<(), ProfileError>> + Send {
        let this = self.clone();
        let id = profile.id.clone();

        async move {
            let mut inner = this.lock();
            if let Some(error) = inner.delete_failure.take() {
                return Err(error);
            }
            inner.deletions.push(id.clone());
            inner.profiles.retain(|_, stored| stored.id != id);
            Ok(())
        }
    }
}
