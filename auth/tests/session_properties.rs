//! Property tests for provider event sequences.
//!
//! Drives the coordinator reducer directly. Profile results are parked and
//! delivered at arbitrary later points, so fetches regularly resolve after
//! the identity they were started for has been replaced.

#![allow(clippy::unwrap_used, clippy::panic)]

use proptest::prelude::*;
use sessionflow_auth::mocks::{MockIdentityProvider, MockNavigator, MockProfileService};
use sessionflow_auth::reducers::CoordinatorReducer;
use sessionflow_auth::{
    CoordinatorState, IdentitySnapshot, Profile, SessionAction, SessionEnvironment, SessionState,
};
use sessionflow_core::reducer::Reducer;
use sessionflow_testing::{FixedClock, collect_actions, test_clock};
use std::collections::VecDeque;

type Env = SessionEnvironment<MockIdentityProvider, MockProfileService, MockNavigator, FixedClock>;
type TestReducer = CoordinatorReducer<MockIdentityProvider, MockProfileService, MockNavigator, FixedClock>;

const UIDS: [&str; 3] = ["u1", "u2", "u3"];

#[derive(Debug, Clone)]
enum Step {
    /// Provider callback.
    Emit(Option<usize>),
    /// Deliver the oldest parked profile result.
    Deliver,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => prop::option::of(0..UIDS.len()).prop_map(Step::Emit),
        2 => Just(Step::Deliver),
    ]
}

fn snapshot(uid: &str) -> IdentitySnapshot {
    IdentitySnapshot {
        uid: uid.to_string(),
        email: Some(format!("{uid}@example.com")),
        display_name: None,
        photo_url: None,
        email_verified: true,
    }
}

fn environment() -> Env {
    // u3 has no backend record.
    let profiles = MockProfileService::new()
        .with_profile("u1", Profile::new("p-u1"))
        .with_profile("u2", Profile::new("p-u2"));

    SessionEnvironment::new(
        MockIdentityProvider::new(),
        profiles,
        MockNavigator::new(),
        test_clock(),
        chrono::Duration::seconds(60),
    )
}

struct Driver {
    reducer: TestReducer,
    env: Env,
    state: CoordinatorState,
    parked: VecDeque<SessionAction>,
}

impl Driver {
    fn new() -> Self {
        let mut driver = Self {
            reducer: TestReducer::default(),
            env: environment(),
            state: CoordinatorState::default(),
            parked: VecDeque::new(),
        };
        let _ = driver
            .reducer
            .reduce(&mut driver.state, SessionAction::ListenerAttached, &driver.env);
        driver
    }

    /// Reduce `action` and everything its effects produce, parking profile
    /// results instead of feeding them back.
    async fn run(&mut self, action: SessionAction) {
        let mut queue = VecDeque::from([action]);
        while let Some(action) = queue.pop_front() {
            let effects = self.reducer.reduce(&mut self.state, action, &self.env);
            for produced in collect_actions(effects).await {
                if matches!(produced, SessionAction::ProfileLoaded { .. }) {
                    self.parked.push_back(produced);
                } else {
                    queue.push_back(produced);
                }
            }
        }
    }

    async fn apply(&mut self, step: &Step) {
        match step {
            Step::Emit(uid) => {
                let snapshot = uid.map(|i| snapshot(UIDS[i]));
                self.run(SessionAction::IdentityChanged { snapshot }).await;
            },
            Step::Deliver => {
                if let Some(result) = self.parked.pop_front() {
                    self.run(result).await;
                }
            },
        }
    }

    async fn drain(&mut self) {
        while let Some(result) = self.parked.pop_front() {
            self.run(result).await;
        }
    }
}

fn last_emitted(steps: &[Step]) -> Option<Option<&'static str>> {
    steps.iter().rev().find_map(|step| match step {
        Step::Emit(uid) => Some(uid.map(|i| UIDS[i])),
        Step::Deliver => None,
    })
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn settled_state_follows_last_provider_event(steps in prop::collection::vec(step(), 1..24)) {
        let state = block_on(async {
            let mut driver = Driver::new();
            for step in &steps {
                driver.apply(step).await;
            }
            driver.drain().await;
            driver.state
        });

        match last_emitted(&steps) {
            Some(Some(uid)) => {
                prop_assert_eq!(&state.session, &SessionState::Authenticated);
                let combined = state.combined.as_ref().unwrap();
                prop_assert_eq!(combined.uid.as_str(), uid);
                // Never someone else's profile.
                let expected = (uid != "u3").then(|| format!("p-{uid}"));
                prop_assert_eq!(combined.id.clone(), expected);
            },
            Some(None) => {
                prop_assert_eq!(&state.session, &SessionState::Unauthenticated);
                prop_assert!(state.combined.is_none());
                prop_assert!(state.profile.is_none());
            },
            None => prop_assert_eq!(&state.session, &SessionState::Authenticating),
        }
    }

    #[test]
    fn merged_profile_always_belongs_to_identity(steps in prop::collection::vec(step(), 1..24)) {
        block_on(async {
            let mut driver = Driver::new();
            for step in &steps {
                driver.apply(step).await;

                if let (Some(identity), Some(combined)) = (&driver.state.identity, &driver.state.combined) {
                    assert_eq!(identity.uid, combined.uid);
                    if let Some(id) = &combined.id {
                        assert_eq!(id, &format!("p-{}", identity.uid));
                    }
                }
            }
        });
    }

    #[test]
    fn one_fetch_per_identification(uid in 0..UIDS.len(), repeats in 1usize..5) {
        let (fetches, transitions) = block_on(async {
            let mut driver = Driver::new();
            let event = Step::Emit(Some(uid));
            driver.apply(&event).await;
            driver.drain().await;
            let transitions = driver.state.history.len();

            for _ in 0..repeats {
                driver.apply(&event).await;
                driver.drain().await;
            }
            (driver.env.profiles.fetches().len(), driver.state.history.len() - transitions)
        });

        prop_assert_eq!(fetches, 1);
        prop_assert_eq!(transitions, 0);
    }
}
