//! Error types for the session coordinator and its collaborators.

use sessionflow_runtime::StoreError;
use std::borrow::Cow;
use thiserror::Error;

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Failures reported by the identity provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The user closed the interactive sign-in flow.
    #[error("Sign-in was cancelled by the user")]
    Cancelled,

    /// The interactive sign-in window could not be opened.
    #[error("Sign-in popup was blocked")]
    PopupBlocked,

    /// Email/password sign-in was rejected.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The provider has no signed-in user.
    #[error("No signed-in user")]
    NoCurrentUser,

    /// The provider could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// Registering the session-change listener failed.
    #[error("Failed to subscribe to session changes: {0}")]
    Subscription(String),

    /// Sign-out failed.
    #[error("Sign-out failed: {0}")]
    SignOut(String),

    /// Any other provider failure.
    #[error("Identity provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Message suitable for showing to the user.
    ///
    /// Provider-reported text is shown as is; failures without one fall
    /// back to a generic sign-in message.
    ///
    /// # Examples
    ///
    /// ```
    /// # use sessionflow_auth::ProviderError;
    /// assert_eq!(
    ///     ProviderError::SignOut("offline".into()).user_message(),
    ///     "Failed to sign out. Please try again."
    /// );
    /// ```
    #[must_use]
    pub fn user_message(&self) -> Cow<'_, str> {
        match self {
            Self::Cancelled => Cow::Borrowed("Sign-in was cancelled. Please try again."),
            Self::PopupBlocked => {
                Cow::Borrowed("The sign-in window was blocked. Allow popups and try again.")
            },
            Self::InvalidCredentials => Cow::Borrowed("Invalid email or password."),
            Self::SignOut(_) => Cow::Borrowed("Failed to sign out. Please try again."),
            Self::Subscription(_) => {
                Cow::Borrowed("Unable to reach the sign-in service. Please try again.")
            },
            Self::Other(message) if !message.trim().is_empty() => Cow::Borrowed(message.trim()),
            Self::NoCurrentUser | Self::Network(_) | Self::Other(_) => {
                Cow::Borrowed("Failed to sign in. Please try again.")
            },
        }
    }
}

/// Failures reported by the backend profile service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// The backend rejected the bearer token.
    #[error("Unauthorized")]
    Unauthorized,

    /// No bearer token was available for the request.
    #[error("No bearer token available")]
    MissingToken,

    /// The backend answered with an unexpected status.
    #[error("Backend error (status {status}): {message}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("Failed to decode profile: {0}")]
    Decode(String),
}

impl ProfileError {
    /// Message suitable for showing to the user.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Unauthorized | Self::MissingToken => {
                "Your session could not be verified by the server. Some profile details are unavailable."
            },
            Self::Backend { .. } | Self::Transport(_) | Self::Decode(_) => {
                "Your profile could not be loaded. Some details may be missing."
            },
        }
    }
}

/// Failures while obtaining a bearer token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The provider failed to mint or refresh the token.
    #[error("Token fetch failed: {0}")]
    FetchFailed(#[from] ProviderError),
}

/// Errors returned by the [`SessionCoordinator`](crate::coordinator::SessionCoordinator) facade.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// `start()` was called more than once.
    #[error("Coordinator already started")]
    AlreadyStarted,

    /// The coordinator is shutting down and rejects new commands.
    #[error("Coordinator is shutting down")]
    ShuttingDown,

    /// `dismiss_error()` was called while no error is shown.
    #[error("No error to dismiss")]
    NoErrorToDismiss,

    /// `delete_profile()` needs an authenticated session with a loaded profile.
    #[error("No profile loaded")]
    NoProfile,

    /// The identity listener could not be attached.
    #[error("Listener failed: {0}")]
    Listener(ProviderError),

    /// Token retrieval failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Waiting for a session condition timed out.
    #[error("Timed out waiting for session state")]
    Timeout,

    /// Shutdown did not finish in time.
    #[error("Shutdown timed out with {0} effects still running")]
    ShutdownTimeout(usize),
}

impl From<StoreError> for CoordinatorError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ShutdownInProgress | StoreError::ChannelClosed => Self::ShuttingDown,
            StoreError::Timeout => Self::Timeout,
            StoreError::ShutdownTimeout(pending) => Self::ShutdownTimeout(pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_messages_fall_back_to_generic_sign_in_text() {
        assert_eq!(
            ProviderError::Network("timeout".into()).user_message(),
            "Failed to sign in. Please try again."
        );
        assert_eq!(ProviderError::InvalidCredentials.user_message(), "Invalid email or password.");
        assert_eq!(
            ProviderError::Other("  ".into()).user_message(),
            "Failed to sign in. Please try again."
        );
    }

    #[test]
    fn provider_text_is_shown_when_present() {
        assert_eq!(
            ProviderError::Other("Firebase: Error (auth/popup-closed-by-user).".into())
                .user_message(),
            "Firebase: Error (auth/popup-closed-by-user)."
        );
    }

    #[test]
    fn store_errors_map_to_coordinator_errors() {
        assert_eq!(
            CoordinatorError::from(StoreError::ShutdownInProgress),
            CoordinatorError::ShuttingDown
        );
        assert_eq!(
            CoordinatorError::from(StoreError::ShutdownTimeout(2)),
            CoordinatorError::ShutdownTimeout(2)
        );
    }

    #[test]
    fn token_error_wraps_provider_error() {
        let error = TokenError::from(ProviderError::Network("offline".into()));
        assert_eq!(error.to_string(), "Token fetch failed: Network error: offline");
    }
}
