//! Fixtures shared by the unit tests.

use crate::environment::SessionEnvironment;
use crate::mocks::{MockIdentityProvider, MockNavigator, MockProfileService};
use crate::reducers::CoordinatorReducer;
use crate::state::IdentitySnapshot;
use chrono::Duration;
use sessionflow_testing::{FixedClock, test_clock};

pub type TestEnv =
    SessionEnvironment<MockIdentityProvider, MockProfileService, MockNavigator, FixedClock>;

pub type TestReducer =
    CoordinatorReducer<MockIdentityProvider, MockProfileService, MockNavigator, FixedClock>;

pub fn test_env() -> TestEnv {
    SessionEnvironment::new(
        MockIdentityProvider::new(),
        MockProfileService::new(),
        MockNavigator::new(),
        test_clock(),
        Duration::seconds(60),
    )
}

pub fn snapshot(uid: &str) -> IdentitySnapshot {
    IdentitySnapshot {
        uid: uid.to_string(),
        email: Some(format!("{uid}@example.com")),
        display_name: None,
        photo_url: None,
        email_verified: true,
    }
}
