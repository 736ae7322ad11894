//! Coordinator metrics.

use crate::actions::CommandKind;
use crate::state::SessionState;
use metrics::{counter, describe_counter};

/// Register descriptions for the coordinator metrics.
///
/// Call after installing a recorder so the exporter can render help text.
pub fn register_metrics() {
    describe_counter!(
        "session_transitions_total",
        "Session state transitions, labelled by target state"
    );
    describe_counter!(
        "session_commands_total",
        "Commands started, labelled by kind"
    );
    describe_counter!(
        "session_commands_coalesced_total",
        "Commands dropped by coalescing, labelled by kind"
    );
    describe_counter!(
        "session_profile_stale_discarded_total",
        "Profile results discarded because the identity changed"
    );
    describe_counter!(
        "session_profile_failures_total",
        "Profile fetches that failed"
    );
}

/// Coordinator metrics recorder.
pub struct SessionMetrics;

impl SessionMetrics {
    /// Record a transition into `to`.
    pub fn record_transition(to: &SessionState) {
        counter!("session_transitions_total", "to" => to.label()).increment(1);
    }

    /// Record a command that started executing.
    pub fn record_command(kind: CommandKind) {
        counter!("session_commands_total", "kind" => kind.label()).increment(1);
    }

    /// Record a command dropped by coalescing.
    pub fn record_coalesced(kind: CommandKind) {
        counter!("session_commands_coalesced_total", "kind" => kind.label()).increment(1);
    }

    /// Record a stale profile result.
    pub fn record_stale_profile() {
        counter!("session_profile_stale_discarded_total").increment(1);
    }

    /// Record a failed profile fetch.
    pub fn record_profile_failure() {
        counter!("session_profile_failures_total").increment(1);
    }
}
