//! Coordinator configuration.
//!
//! Values default to what the web client ships with; applications override
//! them through the `with_*` builders.

use chrono::Duration;

/// Session coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Window in which repeated commands of the same kind collapse into one.
    ///
    /// Default: 1 second
    pub coalesce_window: Duration,

    /// Where to land after authentication when no target was captured.
    ///
    /// Default: `/home`
    pub default_landing_path: String,

    /// Query parameter carrying the pre-authentication target path.
    ///
    /// Default: `from`
    pub redirect_param: String,

    /// Number of state transitions kept for inspection.
    ///
    /// Default: 32
    pub history_capacity: usize,

    /// Cached tokens are refreshed this long before they expire.
    ///
    /// Default: 60 seconds
    pub token_expiry_skew: Duration,
}

impl CoordinatorConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the coalescing window.
    #[must_use]
    pub const fn with_coalesce_window(mut self, window: Duration) -> Self {
        self.coalesce_window = window;
        self
    }

    /// Set the default landing path.
    #[must_use]
    pub fn with_default_landing_path(mut self, path: impl Into<String>) -> Self {
        self.default_landing_path = path.into();
        self
    }

    /// Set the redirect query parameter name.
    #[must_use]
    pub fn with_redirect_param(mut self, param: impl Into<String>) -> Self {
        self.redirect_param = param.into();
        self
    }

    /// Set the transition history capacity.
    #[must_use]
    pub const fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set the token expiry skew.
    #[must_use]
    pub const fn with_token_expiry_skew(mut self, skew: Duration) -> Self {
        self.token_expiry_skew = skew;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            coalesce_window: Duration::seconds(1),
            default_landing_path: "/home".to_string(),
            redirect_param: "from".to_string(),
            history_capacity: 32,
            token_expiry_skew: Duration::seconds(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = CoordinatorConfig::new()
            .with_coalesce_window(Duration::milliseconds(250))
            .with_default_landing_path("/dashboard")
            .with_redirect_param("next")
            .with_history_capacity(4);

        assert_eq!(config.coalesce_window, Duration::milliseconds(250));
        assert_eq!(config.default_landing_path, "/dashboard");
        assert_eq!(config.redirect_param, "next");
        assert_eq!(config.history_capacity, 4);
        assert_eq!(config.token_expiry_skew, Duration::seconds(60));
    }
}
