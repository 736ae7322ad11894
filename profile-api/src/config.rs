//! Profile API configuration

use crate::error::ProfileApiError;
use std::time::Duration;

/// Where the backend lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileApiConfig {
    /// API root, e.g. `https://api.example.com`
    pub base_url: String,
    /// Version segment appended to the root
    pub api_version: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ProfileApiConfig {
    /// Default API version
    pub const DEFAULT_VERSION: &'static str = "v1";

    /// Default request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Configuration for `base_url` with default version and timeout
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_version: Self::DEFAULT_VERSION.to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Read `REST_API_ROOT` and `REST_API_VERSION`
    ///
    /// # Errors
    ///
    /// Returns [`ProfileApiError::MissingEndpoint`] if `REST_API_ROOT` is not set
    pub fn from_env() -> Result<Self, ProfileApiError> {
        let base_url = std::env::var("REST_API_ROOT")
            .map_err(|_| ProfileApiError::MissingEndpoint("REST_API_ROOT"))?;

        let config = Self::new(base_url);
        Ok(match std::env::var("REST_API_VERSION") {
            Ok(version) if !version.trim().is_empty() => config.with_api_version(version.trim()),
            _ => config,
        })
    }

    /// Set the API version
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{base_url}/{api_version}` without a trailing slash
    ///
    /// # Errors
    ///
    /// Returns [`ProfileApiError::InvalidBaseUrl`] unless the root is an
    /// absolute http(s) URL
    pub fn endpoint(&self) -> Result<String, ProfileApiError> {
        let root = self.base_url.trim().trim_end_matches('/');
        if !(root.starts_with("http://") || root.starts_with("https://")) {
            return Err(ProfileApiError::InvalidBaseUrl(self.base_url.clone()));
        }

        let version = self.api_version.trim_matches('/');
        Ok(if version.is_empty() {
            root.to_string()
        } else {
            format!("{root}/{version}")
        })
    }
}
