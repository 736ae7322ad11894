//! Command Dispatcher.
//!
//! Turns user commands into provider calls. Two rules keep rapid or
//! overlapping input from producing duplicate calls:
//!
//! - **Coalescing**: a command whose kind is already running or waiting, or
//!   whose kind was accepted less than the coalescing window ago, is dropped.
//!   A logout issued after a sign-in is never dropped by the window.
//! - **Ordering**: logout never overlaps login or re-authentication. The
//!   later command waits and starts once the earlier one finished, in issue
//!   order.
//!
//! Completions carry the ticket handed out when the command started.

use super::session::{identify, sign_out_locally};
use super::{Effects, enter};
use crate::actions::{Command, CommandKind, CommandRequest, LoginMethod, SessionAction};
use crate::environment::SessionEnvironment;
use crate::error::ProviderError;
use crate::metrics::SessionMetrics;
use crate::providers::{IdentityProvider, Navigator, ProfileService};
use crate::state::{CommandLedger, CoordinatorState, IdentitySnapshot, SessionState};
use chrono::{DateTime, Duration, Utc};
use sessionflow_core::effect::Effect;
use sessionflow_core::environment::Clock;
use sessionflow_core::{SmallVec, smallvec};

/// Command reducer.
#[derive(Debug, Clone, Copy)]
pub struct CommandReducer {
    coalesce_window: Duration,
}

impl CommandReducer {
    /// Create a command reducer with the given coalescing window.
    #[must_use]
    pub const fn new(coalesce_window: Duration) -> Self {
        Self { coalesce_window }
    }

    /// Reduce a command action.
    pub fn reduce<P, S, N, C>(
        &self,
        state: &mut CoordinatorState,
        action: SessionAction,
        env: &SessionEnvironment<P, S, N, C>,
    ) -> Effects
    where
        P: IdentityProvider + Clone + 'static,
        S: ProfileService + Clone + 'static,
        N: Navigator + Clone + 'static,
        C: Clock + Clone + 'static,
    {
        match action {
            SessionAction::Dispatch(command) => self.dispatch(state, command, env, false),

            SessionAction::DismissError => {
                if !matches!(state.session, SessionState::Error { .. }) {
                    tracing::debug!(state = state.session.label(), "No error to dismiss");
                    return smallvec![Effect::None];
                }
                enter(state, SessionState::Authenticating, &env.clock);
                let command = Command::re_authenticate(env.clock.now());
                self.dispatch(state, command, env, true)
            },

            SessionAction::CommandFinished {
                kind,
                ticket,
                result,
            } => Self::finish(state, kind, ticket, result, env),

            _ => SmallVec::new(),
        }
    }

    fn dispatch<P, S, N, C>(
        &self,
        state: &mut CoordinatorState,
        command: Command,
        env: &SessionEnvironment<P, S, N, C>,
        bypass_window: bool,
    ) -> Effects
    where
        P: IdentityProvider + Clone + 'static,
        S: ProfileService + Clone + 'static,
        N: Navigator + Clone + 'static,
        C: Clock + Clone + 'static,
    {
        let kind = command.kind();
        let ledger = &state.commands;

        let duplicate = ledger.is_running(kind) || ledger.is_deferred(kind);
        if duplicate || (!bypass_window && self.within_window(ledger, kind, command.issued_at)) {
            tracing::debug!(kind = kind.label(), in_flight = duplicate, "Command coalesced");
            SessionMetrics::record_coalesced(kind);
            return smallvec![Effect::None];
        }

        state.commands.accept(kind, command.issued_at);

        if must_wait(&state.commands, kind) {
            tracing::info!(kind = kind.label(), "Command deferred behind a conflicting command");
            state.commands.deferred.push_back(command);
            return smallvec![Effect::None];
        }

        start(state, command, env)
    }

    fn within_window(&self, ledger: &CommandLedger, kind: CommandKind, at: DateTime<Utc>) -> bool {
        let Some(last) = ledger.last_accepted(kind) else {
            return false;
        };

        if kind == CommandKind::Logout {
            let signed_in_since = [CommandKind::Login, CommandKind::ReAuthenticate]
                .into_iter()
                .filter_map(|k| ledger.last_accepted(k))
                .any(|sign_in| sign_in > last);
            if signed_in_since {
                return false;
            }
        }

        at - last < self.coalesce_window
    }

    fn finish<P, S, N, C>(
        state: &mut CoordinatorState,
        kind: CommandKind,
        ticket: u64,
        result: Result<Option<IdentitySnapshot>, ProviderError>,
        env: &SessionEnvironment<P, S, N, C>,
    ) -> Effects
    where
        P: IdentityProvider + Clone + 'static,
        S: ProfileService + Clone + 'static,
        N: Navigator + Clone + 'static,
        C: Clock + Clone + 'static,
    {
        if !state.commands.finish(ticket) {
            tracing::warn!(kind = kind.label(), ticket, "Completion for unknown command");
            return drain(state, env);
        }

        let mut effects: Effects = SmallVec::new();

        match (kind, result) {
            (CommandKind::Logout, Ok(_)) => {
                tracing::info!(ticket, "Logout completed");
                effects.extend(sign_out_locally(state, env));
            },
            (CommandKind::Logout, Err(error)) => {
                tracing::warn!(ticket, error = %error, "Logout failed");
                enter(
                    state,
                    SessionState::Error {
                        reason: error.user_message().to_string(),
                    },
                    &env.clock,
                );
            },
            // A pending logout owns the outcome of earlier sign-ins.
            (_, _) if state.commands.logout_pending() => {
                tracing::debug!(kind = kind.label(), ticket, "Sign-in outcome superseded by logout");
            },
            (_, Ok(Some(snapshot))) => {
                tracing::info!(kind = kind.label(), ticket, uid = %snapshot.uid, "Command confirmed identity");
                effects.extend(identify(state, snapshot, env));
            },
            (_, Ok(None)) => {
                if state.session == SessionState::Authenticating {
                    effects.extend(sign_out_locally(state, env));
                }
            },
            (_, Err(error)) => {
                tracing::warn!(kind = kind.label(), ticket, error = %error, "Command failed");
                if state.session == SessionState::Authenticating {
                    enter(
                        state,
                        SessionState::Error {
                            reason: error.user_message().to_string(),
                        },
                        &env.clock,
                    );
                }
            },
        }

        effects.extend(drain(state, env));
        effects
    }
}

/// Returns `true` if `kind` has to wait for a conflicting command.
///
/// Waiting commands count too, so issue order is kept.
fn must_wait(ledger: &CommandLedger, kind: CommandKind) -> bool {
    ledger.in_flight.iter().any(|f| kind.conflicts_with(f.kind))
        || ledger.deferred.iter().any(|c| kind.conflicts_with(c.kind()))
}

/// Start waiting commands whose conflicts have cleared.
fn drain<P, S, N, C>(state: &mut CoordinatorState, env: &SessionEnvironment<P, S, N, C>) -> Effects
where
    P: IdentityProvider + Clone + 'static,
    S: ProfileService + Clone + 'static,
    N: Navigator + Clone + 'static,
    C: Clock + Clone + 'static,
{
    let mut effects: Effects = SmallVec::new();

    while let Some(next) = state.commands.deferred.front() {
        let kind = next.kind();
        if state.commands.in_flight.iter().any(|f| kind.conflicts_with(f.kind)) {
            break;
        }
        if let Some(command) = state.commands.deferred.pop_front() {
            effects.extend(start(state, command, env));
        }
    }

    effects
}

fn start<P, S, N, C>(
    state: &mut CoordinatorState,
    command: Command,
    env: &SessionEnvironment<P, S, N, C>,
) -> Effects
where
    P: IdentityProvider + Clone + 'static,
    S: ProfileService + Clone + 'static,
    N: Navigator + Clone + 'static,
    C: Clock + Clone + 'static,
{
    let kind = command.kind();
    let ticket = state.commands.begin(kind);
    SessionMetrics::record_command(kind);
    tracing::info!(kind = kind.label(), ticket, "Command started");

    let identity = env.identity.clone();

    let effect = match command.request {
        CommandRequest::Login(method) => {
            enter(state, SessionState::Authenticating, &env.clock);
            Effect::Future(Box::pin(async move {
                let signed_in = match &method {
                    LoginMethod::Interactive(provider) => {
                        identity.sign_in_interactive(*provider).await
                    },
                    LoginMethod::Credentials { email, password } => {
                        identity.sign_in_with_credential(email, password).await
                    },
                };
                let result =
                    signed_in.map(|()| identity.current_user().map(IdentitySnapshot::from));
                Some(SessionAction::CommandFinished {
                    kind: CommandKind::Login,
                    ticket,
                    result,
                })
            }))
        },

        CommandRequest::Logout => {
            let tokens = env.tokens.clone();
            Effect::Future(Box::pin(async move {
                let result = identity.sign_out().await;
                tokens.clear().await;
                Some(SessionAction::CommandFinished {
                    kind: CommandKind::Logout,
                    ticket,
                    result: result.map(|()| None),
                })
            }))
        },

        CommandRequest::ReAuthenticate => {
            enter(state, SessionState::Authenticating, &env.clock);
            Effect::Future(Box::pin(async move {
                identity.ready().await;
                let result = match identity.current_user() {
                    None => Ok(None),
                    Some(user) => match identity.id_token(false).await {
                        Ok(_) => Ok(Some(IdentitySnapshot::from(user))),
                        Err(ProviderError::NoCurrentUser) => Ok(None),
                        Err(error) => Err(error),
                    },
                };
                Some(SessionAction::CommandFinished {
                    kind: CommandKind::ReAuthenticate,
                    ticket,
                    result,
                })
            }))
        },
    };

    smallvec![effect]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::actions::ProviderKind;
    use crate::test_support::{TestReducer, snapshot, test_env};
    use sessionflow_testing::{ReducerTest, assertions, test_clock};

    fn at(millis: i64) -> DateTime<Utc> {
        test_clock().now() + Duration::milliseconds(millis)
    }

    fn login(millis: i64) -> SessionAction {
        SessionAction::Dispatch(Command::login(
            LoginMethod::Interactive(ProviderKind::Google),
            at(millis),
        ))
    }

    fn logout(millis: i64) -> SessionAction {
        SessionAction::Dispatch(Command::logout(at(millis)))
    }

    fn unauthenticated() -> SessionAction {
        SessionAction::IdentityChanged { snapshot: None }
    }

    #[test]
    fn login_starts_authenticating() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([unauthenticated()])
            .when_action(login(0))
            .then_state(|state| {
                assert_eq!(state.session, SessionState::Authenticating);
                assert!(state.commands.is_running(CommandKind::Login));
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn second_login_while_running_is_coalesced() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([login(0)])
            .when_action(login(5_000))
            .then_state(|state| assert_eq!(state.commands.in_flight.len(), 1))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn second_login_inside_window_is_coalesced() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([
                login(0),
                SessionAction::CommandFinished {
                    kind: CommandKind::Login,
                    ticket: 0,
                    result: Err(ProviderError::Cancelled),
                },
            ])
            .when_action(login(200))
            .then_state(|state| assert!(state.commands.in_flight.is_empty()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn login_after_window_runs_again() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([
                login(0),
                SessionAction::CommandFinished {
                    kind: CommandKind::Login,
                    ticket: 0,
                    result: Err(ProviderError::Cancelled),
                },
            ])
            .when_action(login(1_500))
            .then_state(|state| assert!(state.commands.is_running(CommandKind::Login)))
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn logout_waits_for_running_login() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([login(0)])
            .when_action(logout(10))
            .then_state(|state| {
                assert!(state.commands.is_deferred(CommandKind::Logout));
                assert!(state.commands.logout_pending());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn finished_login_starts_deferred_logout() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([login(0), logout(10)])
            .when_action(SessionAction::CommandFinished {
                kind: CommandKind::Login,
                ticket: 0,
                result: Ok(Some(snapshot("u1"))),
            })
            .then_state(|state| {
                assert!(state.commands.is_running(CommandKind::Logout));
                assert!(state.commands.deferred.is_empty());
                // The sign-in outcome is not applied while logout is pending.
                assert_eq!(state.session, SessionState::Authenticating);
                assert!(state.identity.is_none());
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn logout_after_login_ignores_window() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([
                logout(0),
                SessionAction::CommandFinished {
                    kind: CommandKind::Logout,
                    ticket: 0,
                    result: Ok(None),
                },
                login(100),
                SessionAction::CommandFinished {
                    kind: CommandKind::Login,
                    ticket: 1,
                    result: Ok(Some(snapshot("u1"))),
                },
            ])
            .when_action(logout(300))
            .then_state(|state| assert!(state.commands.is_running(CommandKind::Logout)))
            .run();
    }

    #[test]
    fn repeated_logout_inside_window_is_coalesced() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([
                logout(0),
                SessionAction::CommandFinished {
                    kind: CommandKind::Logout,
                    ticket: 0,
                    result: Ok(None),
                },
            ])
            .when_action(logout(300))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn failed_login_surfaces_error() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([unauthenticated(), login(0)])
            .when_action(SessionAction::CommandFinished {
                kind: CommandKind::Login,
                ticket: 0,
                result: Err(ProviderError::PopupBlocked),
            })
            .then_state(|state| {
                assert_eq!(
                    state.session.error(),
                    Some("The sign-in window was blocked. Allow popups and try again.")
                );
                assert!(state.commands.in_flight.is_empty());
            })
            .run();
    }

    #[test]
    fn failed_logout_surfaces_sign_out_error() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([logout(0)])
            .when_action(SessionAction::CommandFinished {
                kind: CommandKind::Logout,
                ticket: 0,
                result: Err(ProviderError::SignOut("offline".into())),
            })
            .then_state(|state| {
                assert_eq!(
                    state.session.error(),
                    Some("Failed to sign out. Please try again.")
                );
            })
            .run();
    }

    #[test]
    fn dismiss_error_retries_with_reauthentication() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([
                login(0),
                SessionAction::CommandFinished {
                    kind: CommandKind::Login,
                    ticket: 0,
                    result: Err(ProviderError::Cancelled),
                },
            ])
            .when_action(SessionAction::DismissError)
            .then_state(|state| {
                assert_eq!(state.session, SessionState::Authenticating);
                assert!(state.commands.is_running(CommandKind::ReAuthenticate));
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn dismiss_without_error_is_ignored() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([unauthenticated()])
            .when_action(SessionAction::DismissError)
            .then_state(|state| assert_eq!(state.session, SessionState::Unauthenticated))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn unknown_ticket_changes_nothing() {
        ReducerTest::new(TestReducer::default())
            .with_env(test_env())
            .given_state(CoordinatorState::default())
            .given_actions([unauthenticated()])
            .when_action(SessionAction::CommandFinished {
                kind: CommandKind::Login,
                ticket: 42,
                result: Ok(Some(snapshot("u9"))),
            })
            .then_state(|state| {
                assert_eq!(state.session, SessionState::Unauthenticated);
                assert!(state.identity.is_none());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
