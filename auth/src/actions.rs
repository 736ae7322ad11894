//! Coordinator actions.
//!
//! Every input to the coordinator reducer is a [`SessionAction`]: provider
//! callbacks, user commands, and completions of the effects the reducer
//! started. The store reduces them one at a time.

use crate::error::{ProfileError, ProviderError};
use crate::state::{IdentitySnapshot, Profile};
use chrono::{DateTime, Utc};

/// Identity providers available for interactive sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Google
    Google,
    /// Facebook
    Facebook,
    /// Apple
    Apple,
    /// Microsoft
    Microsoft,
}

impl ProviderKind {
    /// Provider id as used by the identity service.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google.com",
            Self::Facebook => "facebook.com",
            Self::Apple => "apple.com",
            Self::Microsoft => "microsoft.com",
        }
    }

    /// Extra scopes requested during interactive sign-in.
    #[must_use]
    pub const fn scopes(self) -> &'static [&'static str] {
        match self {
            Self::Google => &["email", "profile"],
            Self::Microsoft | Self::Apple => &["email"],
            Self::Facebook => &[],
        }
    }
}

/// How a login command authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum LoginMethod {
    /// Interactive flow (popup/redirect) with an external provider.
    Interactive(ProviderKind),
    /// Email and password checked by the identity provider.
    Credentials {
        /// Account email
        email: String,
        /// Account password
        password: String,
    },
}

// Manual Debug so passwords never reach logs.
impl std::fmt::Debug for LoginMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interactive(provider) => f.debug_tuple("Interactive").field(provider).finish(),
            Self::Credentials { email, .. } => f
                .debug_struct("Credentials")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Command kinds. Coalescing and in-flight tracking are per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Sign in
    Login,
    /// Sign out
    Logout,
    /// Re-read the provider session without prompting
    ReAuthenticate,
}

impl CommandKind {
    /// Dense index for per-kind tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Login => 0,
            Self::Logout => 1,
            Self::ReAuthenticate => 2,
        }
    }

    /// Short name used in logs and metric labels.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::ReAuthenticate => "reauthenticate",
        }
    }

    /// Returns `true` if this kind cannot overlap with `other`.
    ///
    /// Logout never overlaps a sign-in of either kind, so the later one waits.
    #[must_use]
    pub const fn conflicts_with(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Logout, Self::Login | Self::ReAuthenticate)
                | (Self::Login | Self::ReAuthenticate, Self::Logout)
        )
    }
}

/// What a command asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRequest {
    /// Sign in with the given method.
    Login(LoginMethod),
    /// Sign out.
    Logout,
    /// Re-read the provider session.
    ReAuthenticate,
}

/// A user command, stamped with the time it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Requested operation.
    pub request: CommandRequest,
    /// When the caller issued it.
    pub issued_at: DateTime<Utc>,
}

impl Command {
    /// Login command.
    #[must_use]
    pub const fn login(method: LoginMethod, issued_at: DateTime<Utc>) -> Self {
        Self {
            request: CommandRequest::Login(method),
            issued_at,
        }
    }

    /// Logout command.
    #[must_use]
    pub const fn logout(issued_at: DateTime<Utc>) -> Self {
        Self {
            request: CommandRequest::Logout,
            issued_at,
        }
    }

    /// Re-authenticate command.
    #[must_use]
    pub const fn re_authenticate(issued_at: DateTime<Utc>) -> Self {
        Self {
            request: CommandRequest::ReAuthenticate,
            issued_at,
        }
    }

    /// The command's kind.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self.request {
            CommandRequest::Login(_) => CommandKind::Login,
            CommandRequest::Logout => CommandKind::Logout,
            CommandRequest::ReAuthenticate => CommandKind::ReAuthenticate,
        }
    }
}

/// All coordinator actions.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    // ═══════════════════════════════════════════════════════════
    // Identity Provider Listener
    // ═══════════════════════════════════════════════════════════

    /// The provider subscription is live.
    ListenerAttached,

    /// Subscribing to the provider failed.
    ListenerFailed {
        /// What went wrong
        error: ProviderError,
    },

    /// The provider reported a session change.
    IdentityChanged {
        /// New identity, `None` when signed out
        snapshot: Option<IdentitySnapshot>,
    },

    // ═══════════════════════════════════════════════════════════
    // Profile Synchronizer
    // ═══════════════════════════════════════════════════════════

    /// Start the profile fetch for an identification.
    SyncProfile {
        /// Identity generation the fetch belongs to
        generation: u64,
    },

    /// The profile fetch finished.
    ProfileLoaded {
        /// Identity generation the fetch was started for
        generation: u64,
        /// Profile (`None` if the backend has no record yet) or failure
        result: Result<Option<Profile>, ProfileError>,
    },

    /// Delete the backend profile of the current user.
    DeleteProfile,

    /// The profile deletion finished.
    ProfileDeleted {
        /// Identity generation the deletion was started for
        generation: u64,
        /// Outcome
        result: Result<(), ProfileError>,
    },

    // ═══════════════════════════════════════════════════════════
    // Command Dispatcher
    // ═══════════════════════════════════════════════════════════

    /// A user command was issued.
    Dispatch(Command),

    /// A command finished executing.
    CommandFinished {
        /// Command kind
        kind: CommandKind,
        /// Ticket handed out when the command started
        ticket: u64,
        /// Identity observed by the command (`None` when there is no
        /// session, always `None` for logout) or failure
        result: Result<Option<IdentitySnapshot>, ProviderError>,
    },

    /// The user dismissed the error message.
    DismissError,

    // ═══════════════════════════════════════════════════════════
    // Redirect Coordinator
    // ═══════════════════════════════════════════════════════════

    /// The UI rendered a location.
    LocationObserved {
        /// Raw query string, with or without the leading `?`
        query: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_password() {
        let method = LoginMethod::Credentials {
            email: "a@x.com".into(),
            password: "hunter2".into(),
        };

        let rendered = format!("{method:?}");
        assert!(rendered.contains("a@x.com"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn logout_conflicts_with_sign_in_kinds_only() {
        assert!(CommandKind::Logout.conflicts_with(CommandKind::Login));
        assert!(CommandKind::ReAuthenticate.conflicts_with(CommandKind::Logout));
        assert!(!CommandKind::Login.conflicts_with(CommandKind::ReAuthenticate));
        assert!(!CommandKind::Logout.conflicts_with(CommandKind::Logout));
    }

    #[test]
    fn google_requests_email_and_profile_scopes() {
        assert_eq!(ProviderKind::Google.scopes(), &["email", "profile"]);
    }
}
