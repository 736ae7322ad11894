//! REST profile service

use crate::config::ProfileApiConfig;
use crate::error::ProfileApiError;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use sessionflow_auth::providers::ProfileService;
use sessionflow_auth::{BearerTokenSource, IdentitySnapshot, Profile, ProfileError};
use std::future::Future;

/// Backend profile service over HTTP
///
/// - `GET {endpoint}/user/me`: profile of the token's user, `404` when the
///   backend has no record yet
/// - `DELETE {endpoint}/user/profile/{id}`
#[derive(Clone)]
pub struct RestProfileService<T> {
    client: Client,
    endpoint: String,
    tokens: T,
}

impl<T> RestProfileService<T>
where
    T: BearerTokenSource + Clone + 'static,
{
    /// Create a client for `config`, authenticating with `tokens`
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is invalid or the HTTP client cannot be built
    pub fn new(config: ProfileApiConfig, tokens: T) -> Result<Self, ProfileApiError> {
        let endpoint = config.endpoint()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProfileApiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            tokens,
        })
    }

    /// Resolved endpoint, `{base_url}/{api_version}`
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Attach the bearer token and send
    async fn send(&self, request: RequestBuilder) -> Result<Response, ProfileError> {
        let token = self
            .tokens
            .bearer_token()
            .await
            .map_err(|e| ProfileError::Transport(e.to_string()))?
            .ok_or(ProfileError::MissingToken)?;

        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProfileError::Transport(e.to_string()))
    }

    /// Fetch the current user's profile
    ///
    /// # Errors
    ///
    /// Returns error for missing tokens, transport failures, non-success
    /// statuses other than `404`, or undecodable bodies
    pub async fn current_profile(&self) -> Result<Option<Profile>, ProfileError> {
        let url = format!("{}/user/me", self.endpoint);
        let response = self.send(self.client.get(&url)).await?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| ProfileError::Transport(e.to_string()))?;
                if body.trim().is_empty() || body.trim() == "null" {
                    return Ok(None);
                }
                serde_json::from_str::<Profile>(&body)
                    .map(Some)
                    .map_err(|e| ProfileError::Decode(e.to_string()))
            },
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(None),
            status => Err(error_for(status, response).await),
        }
    }

    /// Delete the profile with `id`
    ///
    /// # Errors
    ///
    /// Returns error for missing tokens, transport failures, or non-success statuses
    pub async fn delete_profile(&self, id: &str) -> Result<(), ProfileError> {
        let url = format!("{}/user/profile/{id}", self.endpoint);
        let response = self.send(self.client.delete(&url)).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_for(response.status(), response).await)
        }
    }
}

async fn error_for(status: StatusCode, response: Response) -> ProfileError {
    if status == StatusCode::UNAUTHORIZED {
        tracing::warn!("Profile API rejected the bearer token");
        return ProfileError::Unauthorized;
    }

    let message = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "Profile API request failed");
    ProfileError::Backend {
        status: status.as_u16(),
        message,
    }
}

impl<T> ProfileService for RestProfileService<T>
where
    T: BearerTokenSource + Clone + 'static,
{
    fn fetch_current_profile(
        &self,
        _identity: &IdentitySnapshot,
    ) -> impl Future<Output = Result<Option<Profile>, ProfileError>> + Send {
        let this = self.clone();
        async move { this.current_profile().await }
    }

    fn delete_current_profile(
        &self,
        profile: &Profile,
    ) -> impl Future<Output = Result<(), ProfileError>> + Send {
        let this = self.clone();
        let id = profile.id.clone();
        async move { this.delete_profile(&id).await }
    }
}

impl<T> std::fmt::Debug for RestProfileService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestProfileService")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
