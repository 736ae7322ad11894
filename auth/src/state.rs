//! Session state types.
//!
//! Everything the coordinator knows lives in [`CoordinatorState`]. The reducer
//! is the only writer; subscribers receive clones through the store's state
//! channel and the read-only [`SessionView`] projection.

use crate::actions::{Command, CommandKind};
use crate::providers::RawUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// ═══════════════════════════════════════════════════════════════════════
// Data Model
// ═══════════════════════════════════════════════════════════════════════

/// Normalized identity reported by the identity provider.
///
/// Produced fresh on every provider event. Two snapshots describe the same
/// user when their `uid` matches, whatever the other fields say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySnapshot {
    /// Provider-assigned user id.
    pub uid: String,

    /// Email address, if the provider shares one.
    pub email: Option<String>,

    /// Display name.
    pub display_name: Option<String>,

    /// Avatar URL.
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,

    /// Whether the provider verified the email address.
    pub email_verified: bool,
}

impl IdentitySnapshot {
    /// Returns `true` if both snapshots describe the same user.
    #[must_use]
    pub fn same_user(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl From<RawUser> for IdentitySnapshot {
    fn from(user: RawUser) -> Self {
        fn present(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            uid: user.uid,
            email: present(user.email),
            display_name: present(user.display_name),
            photo_url: present(user.photo_url),
            email_verified: user.email_verified,
        }
    }
}

/// Backend-owned profile record.
///
/// Unknown fields are kept in [`extra`](Self::extra) so that nothing the
/// backend adds later is lost on the way to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Backend record id.
    #[serde(alias = "_id")]
    pub id: String,

    /// Identity-provider uid the record belongs to.
    #[serde(rename = "firebaseId", alias = "externalId", default)]
    pub external_id: Option<String>,

    /// Full name.
    #[serde(default)]
    pub name: Option<String>,

    /// Email address on file.
    #[serde(default)]
    pub email: Option<String>,

    /// Phone number on file.
    #[serde(default)]
    pub phone_number: Option<String>,

    /// Avatar URL on file.
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,

    /// Whether the backend considers the email verified.
    #[serde(default)]
    pub email_verified: Option<bool>,

    /// Whether the backend considers the phone verified.
    #[serde(default)]
    pub phone_verified: Option<bool>,

    /// Application role (e.g. `DRIVER`).
    #[serde(default)]
    pub role: Option<String>,

    /// When the record was created.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Fields this type does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Profile {
    /// Create a profile with only an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external_id: None,
            name: None,
            email: None,
            phone_number: None,
            photo_url: None,
            email_verified: None,
            phone_verified: None,
            role: None,
            created_at: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Identity merged with the backend profile.
///
/// Profile fields win where both sides have a value. Until a profile is
/// loaded (or when there is none) the identity fields are used alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedIdentity {
    /// Identity-provider uid.
    pub uid: String,
    /// Email address.
    pub email: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Avatar URL.
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    /// Email verification flag.
    pub email_verified: bool,
    /// Backend profile id, once loaded.
    pub id: Option<String>,
    /// Phone number.
    pub phone_number: Option<String>,
    /// Phone verification flag.
    pub phone_verified: Option<bool>,
    /// Application role.
    pub role: Option<String>,
    /// Profile creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Additional backend fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CombinedIdentity {
    /// Identity-only view, used before the profile resolves or when it fails.
    #[must_use]
    pub fn from_identity(identity: &IdentitySnapshot) -> Self {
        Self {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            photo_url: identity.photo_url.clone(),
            email_verified: identity.email_verified,
            id: None,
            phone_number: None,
            phone_verified: None,
            role: None,
            created_at: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Merge a profile over an identity.
    #[must_use]
    pub fn merge(identity: &IdentitySnapshot, profile: &Profile) -> Self {
        Self {
            uid: identity.uid.clone(),
            email: profile.email.clone().or_else(|| identity.email.clone()),
            display_name: profile.name.clone().or_else(|| identity.display_name.clone()),
            photo_url: profile.photo_url.clone().or_else(|| identity.photo_url.clone()),
            email_verified: profile.email_verified.unwrap_or(identity.email_verified),
            id: Some(profile.id.clone()),
            phone_number: profile.phone_number.clone(),
            phone_verified: profile.phone_verified,
            role: profile.role.clone(),
            created_at: profile.created_at,
            extra: profile.extra.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Session State Machine
// ═══════════════════════════════════════════════════════════════════════

/// Where the session currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SessionState {
    /// No listener attached yet.
    #[default]
    Uninitialized,
    /// Waiting for the provider, or a login/re-authenticate is running.
    Authenticating,
    /// Identity known, profile fetch not started.
    Identified,
    /// Profile fetch in flight.
    Merging,
    /// Identity and profile resolved.
    Authenticated,
    /// The provider reports no session.
    Unauthenticated,
    /// A command failed.
    Error {
        /// User-facing message
        reason: String,
    },
}

impl SessionState {
    /// Short name used in logs and metric labels.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Authenticating => "authenticating",
            Self::Identified => "identified",
            Self::Merging => "merging",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
            Self::Error { .. } => "error",
        }
    }

    /// Identity is confirmed (`Identified`, `Merging` or `Authenticated`).
    #[must_use]
    pub const fn has_identity(&self) -> bool {
        matches!(self, Self::Identified | Self::Merging | Self::Authenticated)
    }

    /// The UI should show a loading indicator.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(
            self,
            Self::Uninitialized | Self::Authenticating | Self::Identified | Self::Merging
        )
    }

    /// Returns `true` for [`SessionState::Authenticated`].
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }

    /// The error message, if this is [`SessionState::Error`].
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { reason } => Some(reason),
            _ => None,
        }
    }
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// State before the change.
    pub from: SessionState,
    /// State after the change.
    pub to: SessionState,
    /// When the change was reduced.
    pub at: DateTime<Utc>,
    /// Identity generation at the time of the change.
    pub generation: u64,
}

/// Bounded log of recent transitions, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionLog {
    entries: VecDeque<Transition>,
    capacity: usize,
}

impl TransitionLog {
    /// Create an empty log keeping at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append a transition, evicting the oldest entry when full.
    pub fn record(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(transition);
    }

    /// Iterate over recorded transitions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.entries.iter()
    }

    /// Number of recorded transitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy the log into a `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Transition> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for TransitionLog {
    fn default() -> Self {
        Self::with_capacity(32)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════

/// A command currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    /// Command kind.
    pub kind: CommandKind,
    /// Ticket matching the eventual completion.
    pub ticket: u64,
}

/// Bookkeeping for command coalescing and ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandLedger {
    /// Commands currently executing.
    pub in_flight: Vec<InFlight>,
    /// Commands waiting for a conflicting command to finish, in issue order.
    pub deferred: VecDeque<Command>,
    /// Issue time of the last accepted command, per kind.
    pub last_accepted: [Option<DateTime<Utc>>; 3],
    /// Next ticket to hand out.
    pub next_ticket: u64,
}

impl CommandLedger {
    /// Returns `true` if a command of `kind` is executing.
    #[must_use]
    pub fn is_running(&self, kind: CommandKind) -> bool {
        self.in_flight.iter().any(|f| f.kind == kind)
    }

    /// Returns `true` if a command of `kind` is waiting to run.
    #[must_use]
    pub fn is_deferred(&self, kind: CommandKind) -> bool {
        self.deferred.iter().any(|c| c.kind() == kind)
    }

    /// Returns `true` if a logout is executing or waiting.
    #[must_use]
    pub fn logout_pending(&self) -> bool {
        self.is_running(CommandKind::Logout) || self.is_deferred(CommandKind::Logout)
    }

    /// Issue time of the last accepted command of `kind`.
    #[must_use]
    pub const fn last_accepted(&self, kind: CommandKind) -> Option<DateTime<Utc>> {
        self.last_accepted[kind.index()]
    }

    /// Record acceptance of a command.
    pub const fn accept(&mut self, kind: CommandKind, at: DateTime<Utc>) {
        self.last_accepted[kind.index()] = Some(at);
    }

    /// Hand out a ticket and mark `kind` as executing.
    pub fn begin(&mut self, kind: CommandKind) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight.push(InFlight { kind, ticket });
        ticket
    }

    /// Remove the executing command with `ticket`. Returns `false` if unknown.
    pub fn finish(&mut self, ticket: u64) -> bool {
        let before = self.in_flight.len();
        self.in_flight.retain(|f| f.ticket != ticket);
        self.in_flight.len() != before
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Redirect
// ═══════════════════════════════════════════════════════════════════════

/// Navigation intent captured before authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingRedirect {
    /// Path to land on after authentication.
    pub target_path: Option<String>,
    /// A location was already inspected during this visit.
    pub captured: bool,
    /// Post-authentication navigation already happened during this visit.
    pub replayed: bool,
}

// ═══════════════════════════════════════════════════════════════════════
// Root State
// ═══════════════════════════════════════════════════════════════════════

/// Status of the identity-provider listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerStatus {
    /// Not attached yet.
    #[default]
    Detached,
    /// Receiving provider events.
    Attached,
    /// Subscribing failed.
    Failed,
}

/// Root coordinator state.
///
/// # Examples
///
/// ```
/// # use sessionflow_auth::{CoordinatorState, SessionState};
/// let state = CoordinatorState::default();
/// assert_eq!(state.session, SessionState::Uninitialized);
/// assert!(state.combined.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorState {
    /// Authoritative session state.
    pub session: SessionState,

    /// Latest identity confirmed by the provider.
    pub identity: Option<IdentitySnapshot>,

    /// Backend profile for `identity`, once loaded.
    pub profile: Option<Profile>,

    /// Merged view handed to the UI.
    pub combined: Option<CombinedIdentity>,

    /// Non-fatal problem to surface alongside an authenticated session.
    pub warning: Option<String>,

    /// Bumped whenever the identity changes. Async results carry the value
    /// they were started with and are dropped when it no longer matches.
    pub generation: u64,

    /// Listener status.
    pub listener: ListenerStatus,

    /// Command bookkeeping.
    pub commands: CommandLedger,

    /// Redirect bookkeeping.
    pub redirect: PendingRedirect,

    /// Recent transitions.
    pub history: TransitionLog,
}

impl CoordinatorState {
    /// Create an empty state whose history keeps `history_capacity` entries.
    #[must_use]
    pub fn with_history_capacity(history_capacity: usize) -> Self {
        Self {
            history: TransitionLog::with_capacity(history_capacity),
            ..Self::default()
        }
    }

    /// Read-only projection for the UI.
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.session.clone(),
            identity: self.combined.clone(),
            error: self.session.error().map(str::to_string),
            warning: self.warning.clone(),
        }
    }

    /// Uid of the current identity.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.uid.as_str())
    }
}

/// What subscribers see on every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Session state.
    pub state: SessionState,
    /// Combined identity, when a user is known.
    pub identity: Option<CombinedIdentity>,
    /// Message of a failed command.
    pub error: Option<String>,
    /// Non-fatal warning (profile unavailable, ...).
    pub warning: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn identity() -> IdentitySnapshot {
        IdentitySnapshot {
            uid: "u1".into(),
            email: Some("a@x.com".into()),
            display_name: Some("Ada".into()),
            photo_url: Some("https://img/a.png".into()),
            email_verified: false,
        }
    }

    #[test]
    fn merge_prefers_profile_fields() {
        let mut profile = Profile::new("p1").with_role("DRIVER").with_name("Ada Lovelace");
        profile.email_verified = Some(true);

        let combined = CombinedIdentity::merge(&identity(), &profile);

        assert_eq!(combined.uid, "u1");
        assert_eq!(combined.email.as_deref(), Some("a@x.com"));
        assert_eq!(combined.display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(combined.id.as_deref(), Some("p1"));
        assert_eq!(combined.role.as_deref(), Some("DRIVER"));
        assert!(combined.email_verified);
    }

    #[test]
    fn loading_covers_states_before_resolution() {
        assert!(SessionState::Authenticating.is_loading());
        assert!(SessionState::Merging.is_loading());
        assert!(!SessionState::Authenticated.is_loading());
        assert!(!SessionState::Unauthenticated.is_loading());
        assert!(
            !SessionState::Error {
                reason: "x".into()
            }
            .is_loading()
        );
    }

    #[test]
    fn identity_only_view_has_no_profile_fields() {
        let combined = CombinedIdentity::from_identity(&identity());
        assert_eq!(combined.photo_url.as_deref(), Some("https://img/a.png"));
        assert!(combined.id.is_none());
        assert!(combined.role.is_none());
    }

    #[test]
    fn raw_user_blank_fields_are_dropped() {
        let snapshot = IdentitySnapshot::from(RawUser {
            uid: "u9".into(),
            email: Some("  ".into()),
            display_name: Some(" Grace ".into()),
            photo_url: None,
            email_verified: true,
            phone_number: None,
        });

        assert_eq!(snapshot.email, None);
        assert_eq!(snapshot.display_name.as_deref(), Some("Grace"));
    }

    #[test]
    fn profile_decodes_backend_payload() {
        let profile: Profile = serde_json::from_value(serde_json::json!({
            "_id": "p1",
            "firebaseId": "u1",
            "name": "Ada",
            "phoneNumber": "+100",
            "role": "DRIVER",
            "createdAt": "2024-03-01T10:00:00Z",
            "plan": "gold"
        }))
        .unwrap();

        assert_eq!(profile.id, "p1");
        assert_eq!(profile.external_id.as_deref(), Some("u1"));
        assert_eq!(profile.phone_number.as_deref(), Some("+100"));
        assert_eq!(profile.extra.get("plan"), Some(&serde_json::json!("gold")));
    }

    #[test]
    fn transition_log_evicts_oldest() {
        let mut log = TransitionLog::with_capacity(2);
        for generation in 0..3 {
            log.record(Transition {
                from: SessionState::Uninitialized,
                to: SessionState::Authenticating,
                at: Utc::now(),
                generation,
            });
        }

        let generations: Vec<u64> = log.iter().map(|t| t.generation).collect();
        assert_eq!(generations, vec![1, 2]);
    }

    #[test]
    fn session_state_serializes_with_status_tag() {
        let json = serde_json::to_value(SessionState::Error { reason: "boom".into() }).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "error", "reason": "boom" }));
    }
}
