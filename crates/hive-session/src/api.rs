//! HiveBooks backend REST client.
//!
//! [`HiveApi`] is the seam the session talks through; [`HiveApiClient`]
//! implements it over HTTP with `reqwest`.

use crate::error::{SessionError, SessionResult};
use crate::models::{
    AccessGrant, AuthenticationRequest, ErrorBody, Identity, IdentityPatch, PasswordChange,
    RegistrationRequest,
};
use async_trait::async_trait;
use hive_config_and_utils::Config;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Backend endpoints used by the session.
#[async_trait]
pub trait HiveApi: Send + Sync {
    /// `POST /auth/authenticate`
    async fn authenticate(&self, email: &str, secret: &str) -> SessionResult<AccessGrant>;

    /// `POST /users/register`
    async fn register(&self, request: &RegistrationRequest) -> SessionResult<()>;

    /// `GET /users/me`
    async fn fetch_identity(&self, access_token: &str) -> SessionResult<Identity>;

    /// `PUT /users/update`. Returns the stored identity when the backend
    /// echoes it.
    async fn update_identity(
        &self,
        access_token: &str,
        patch: &IdentityPatch,
    ) -> SessionResult<Option<Identity>>;

    /// `PATCH /users/password`
    async fn change_password(&self, access_token: &str, change: &PasswordChange)
        -> SessionResult<()>;
}

/// HTTP implementation of [`HiveApi`].
#[derive(Clone)]
pub struct HiveApiClient {
    http_client: reqwest::Client,
    api_url: String,
}

/// A non-success answer, with the body already consumed.
struct Failure {
    status: StatusCode,
    message: Option<String>,
}

impl Failure {
    fn message_or(self, default: &str) -> String {
        self.message.unwrap_or_else(|| default.to_string())
    }
}

fn transport_error(e: reqwest::Error) -> SessionError {
    if e.is_timeout() {
        SessionError::Timeout
    } else if e.is_connect() {
        SessionError::NetworkUnavailable(e.to_string())
    } else {
        SessionError::Http(e)
    }
}

async fn read_failure(response: Response, operation: &str) -> Failure {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body_summary = summarize_response_body(&body);
    tracing::warn!(status = %status, body_summary = %body_summary, operation, "Request failed");

    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty());
    Failure { status, message }
}

async fn decode<T: DeserializeOwned>(response: Response) -> SessionResult<T> {
    let body = response.text().await.map_err(transport_error)?;
    Ok(serde_json::from_str(&body)?)
}

fn is_rejection(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

impl HiveApiClient {
    /// Create a client for `api_url` with a per-request timeout.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> SessionResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Config(format!("HTTP client: {}", e)))?;
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http_client,
            api_url,
        })
    }

    pub fn from_config(config: &Config) -> SessionResult<Self> {
        let url = config
            .api_url()
            .map_err(|e| SessionError::Config(e.to_string()))?;
        Self::new(url.as_str(), config.request_timeout())
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }
}

#[async_trait]
impl HiveApi for HiveApiClient {
    async fn authenticate(&self, email: &str, secret: &str) -> SessionResult<AccessGrant> {
        let url = self.endpoint("/auth/authenticate");
        tracing::debug!(url = %url, "Authenticating");

        let response = self
            .http_client
            .post(&url)
            .json(&AuthenticationRequest { email, secret })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let failure = read_failure(response, "authenticate").await;
            return Err(SessionError::Authentication(
                failure.message_or("Invalid email or password"),
            ));
        }

        decode(response).await
    }

    async fn register(&self, request: &RegistrationRequest) -> SessionResult<()> {
        let url = self.endpoint("/users/register");
        tracing::debug!(url = %url, "Registering account");

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let failure = read_failure(response, "register").await;
            return Err(SessionError::Registration(
                failure.message_or("Could not create the account"),
            ));
        }
        Ok(())
    }

    async fn fetch_identity(&self, access_token: &str) -> SessionResult<Identity> {
        let url = self.endpoint("/users/me");
        tracing::debug!(url = %url, "Fetching identity");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let failure = read_failure(response, "fetch_identity").await;
            if status.is_client_error() {
                return Err(SessionError::SessionExpired);
            }
            if status.is_server_error() {
                return Err(SessionError::Server {
                    status: status.as_u16(),
                    message: failure.message_or("Server error"),
                });
            }
            return Err(SessionError::Api {
                status: status.as_u16(),
                message: failure.message_or("Unexpected response"),
            });
        }

        decode(response).await
    }

    async fn update_identity(
        &self,
        access_token: &str,
        patch: &IdentityPatch,
    ) -> SessionResult<Option<Identity>> {
        let url = self.endpoint("/users/update");
        tracing::debug!(url = %url, "Updating identity");

        let response = self
            .http_client
            .put(&url)
            .bearer_auth(access_token)
            .json(patch)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let failure = read_failure(response, "update_identity").await;
            if is_rejection(status) {
                return Err(SessionError::SessionExpired);
            }
            return Err(SessionError::Api {
                status: status.as_u16(),
                message: failure.message_or("Could not update the profile"),
            });
        }

        let body = response.text().await.map_err(transport_error)?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<Identity>(&body) {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    body_summary = %summarize_response_body(&body),
                    "Update answer is not an identity"
                );
                Ok(None)
            }
        }
    }

    async fn change_password(
        &self,
        access_token: &str,
        change: &PasswordChange,
    ) -> SessionResult<()> {
        let url = self.endpoint("/users/password");
        tracing::debug!(url = %url, "Changing password");

        let response = self
            .http_client
            .patch(&url)
            .bearer_auth(access_token)
            .json(change)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let failure = read_failure(response, "change_password").await;
            if is_rejection(status) {
                return Err(SessionError::SessionExpired);
            }
            return Err(SessionError::Api {
                status: status.as_u16(),
                message: failure.message_or("Could not change the password"),
            });
        }
        Ok(())
    }
}
