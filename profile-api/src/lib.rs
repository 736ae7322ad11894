//! # Sessionflow Profile API Client
//!
//! HTTP implementation of the backend profile boundary. Every request
//! carries `Authorization: Bearer <token>` from a
//! [`BearerTokenSource`](sessionflow_auth::BearerTokenSource), normally the
//! coordinator's token manager.
//!
//! ## Example
//!
//! ```no_run
//! use sessionflow_profile_api::{ProfileApiConfig, RestProfileService};
//! # use sessionflow_auth::{BearerTokenSource, TokenError};
//! # #[derive(Clone)]
//! # struct Tokens;
//! # impl BearerTokenSource for Tokens {
//! #     fn bearer_token(&self) -> impl std::future::Future<Output = Result<Option<String>, TokenError>> + Send {
//! #         std::future::ready(Ok(Some("token".to_string())))
//! #     }
//! # }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // REST_API_ROOT=https://api.example.com REST_API_VERSION=v1
//! let config = ProfileApiConfig::from_env()?;
//! let profiles = RestProfileService::new(config, Tokens)?;
//! # let _ = profiles;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;

// Re-export main types for convenience
pub use client::RestProfileService;
pub use config::ProfileApiConfig;
pub use error::ProfileApiError;
