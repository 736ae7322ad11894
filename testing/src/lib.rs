//! # Sessionflow Testing
//!
//! Testing utilities for reducers and stores built on `sessionflow-core`.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - The [`ReducerTest`] Given-When-Then harness
//! - Effect assertion helpers
//!
//! ## Example
//!
//! ```ignore
//! use sessionflow_testing::ManualClock;
//! use std::time::Duration;
//!
//! #[tokio::test]
//! async fn coalescing_window_expires() {
//!     let clock = ManualClock::default();
//!     let coordinator = coordinator_with_clock(clock.clone());
//!
//!     coordinator.re_authenticate().await?;
//!     clock.advance(Duration::from_secs(2));
//!     coordinator.re_authenticate().await?;
//! }
//! ```

use chrono::{DateTime, Utc};
use sessionflow_core::environment::Clock;


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use sessionflow_testing::mocks::FixedClock;
    /// use sessionflow_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// the other to the code under test.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward
        ///
        /// # Panics
        ///
        /// Panics if `by` does not fit in a `chrono::Duration` or the lock is
        /// poisoned.
        #[allow(clippy::expect_used)] // Test helper
        pub fn advance(&self, by: Duration) {
            let by = chrono::Duration::from_std(by).expect("duration out of range");
            let mut time = self.time.lock().expect("clock mutex poisoned");
            *time += by;
        }

        /// Jump to an absolute time
        ///
        /// # Panics
        ///
        /// Panics if the lock is poisoned.
        #[allow(clippy::expect_used)] // Test helper
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().expect("clock mutex poisoned") = to;
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(epoch())
        }
    }

    impl Clock for ManualClock {
        #[allow(clippy::expect_used)] // Test helper
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().expect("clock mutex poisoned")
        }
    }

    #[allow(clippy::expect_used)]
    fn epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use reducer_test::{ReducerTest, assertions, collect_actions};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::default();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::from_millis(1500));

        assert_eq!(clock.now() - start, chrono::Duration::milliseconds(1500));
    }
}
