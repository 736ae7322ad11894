//! Error types for the profile API client

use thiserror::Error;

/// Errors while setting up the profile API client
///
/// Request failures are reported as
/// [`ProfileError`](sessionflow_auth::ProfileError) through the
/// `ProfileService` trait.
#[derive(Debug, Error)]
pub enum ProfileApiError {
    /// Required environment variable is not set
    #[error("Missing {0} environment variable")]
    MissingEndpoint(&'static str),

    /// Base URL is not an absolute http(s) URL
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}
