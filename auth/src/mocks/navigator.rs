//! Mock navigator.

use crate::providers::Navigator;
use std::sync::{Arc, Mutex, PoisonError};

/// A recorded navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Target path
    pub path: String,
    /// Whether the history entry was replaced
    pub replace: bool,
}

/// Mock navigator that records every navigation.
#[derive(Debug, Clone, Default)]
pub struct MockNavigator {
    navigations: Arc<Mutex<Vec<Navigation>>>,
}

impl MockNavigator {
    /// Create a navigator with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigations so far, in order.
    #[must_use]
    pub fn navigations(&self) -> Vec<Navigation> {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Paths navigated to so far, in order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.navigations().into_iter().map(|n| n.path).collect()
    }
}

impl Navigator for MockNavigator {
    fn navigate(&self, path: &str, replace: bool) {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Navigation {
                path: path.to_string(),
                replace,
            });
    }
}
