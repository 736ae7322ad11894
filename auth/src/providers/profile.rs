//! Backend profile service trait.

use crate::error::ProfileError;
use crate::state::{IdentitySnapshot, Profile};
use std::future::Future;

/// Backend profile service.
///
/// Implementations attach the bearer token themselves (see
/// [`BearerTokenSource`](crate::token::BearerTokenSource)).
pub trait ProfileService: Send + Sync {
    /// Fetch the profile of the signed-in user.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the backend has no record for this identity yet.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The backend rejects the token
    /// - The request fails
    /// - The response is malformed
    fn fetch_current_profile(
        &self,
        identity: &IdentitySnapshot,
    ) -> impl Future<Output = Result<Option<Profile>, ProfileError>> + Send;

    /// Delete the profile of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns error if the backend rejects the deletion or is unreachable.
    fn delete_current_profile(
        &self,
        profile: &Profile,
    ) -> impl Future<Output = Result<(), ProfileError>> + Send;
}
