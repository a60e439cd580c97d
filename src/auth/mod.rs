//! Authenticated HTTP access to the job-dispatch API
//!
//! The worker holds a single bearer token, refreshed lazily on login and
//! re-acquired once on a 401, following the reference crate's retry loop
//! in `worker::http::HttpClient` but shaped around one long-lived token
//! rather than a per-call download (spec §4.B, §6 `WORKER_USERNAME` /
//! `WORKER_PASSWORD`).

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication rejected: {0}")]
    AuthFailure(String),

    #[error("transient failure contacting API: {0}")]
    Transient(String),

    #[error("request rejected by API: {0}")]
    BadRequest(String),

    #[error("unexpected API response: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone)]
struct TokenState {
    token: String,
    expires_at: OffsetDateTime,
}

/// Authenticated client for the job-dispatch API (spec §4.B poll /
/// claim / result endpoints).
pub struct AuthClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    token: Mutex<Option<TokenState>>,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            token: Mutex::new(None),
        }
    }

    /// Build a client whose inner [`Client`] carries explicit per-call
    /// timeouts (spec §6 `HTTP_TIMEOUT_POLL_MS` / `HTTP_TIMEOUT_RESULT_MS`).
    pub fn with_timeout(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Protocol(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn login(&self) -> Result<TokenState, AuthError> {
        let body = LoginRequest {
            username: &self.username,
            password: &self.password,
        };

        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Transient(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let parsed: LoginResponse = response
                    .json()
                    .await
                    .map_err(|e| AuthError::Protocol(e.to_string()))?;
                debug!("authenticated against job-dispatch API");
                Ok(TokenState {
                    token: parsed.token,
                    expires_at: parsed.expires_at,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthError::AuthFailure("credentials rejected".to_string()))
            }
            status if status.is_server_error() => Err(AuthError::Transient(format!("login returned {status}"))),
            status => Err(AuthError::Protocol(format!("login returned {status}"))),
        }
    }

    /// Return a cached token if still valid, otherwise log in.
    async fn ensure_token(&self) -> Result<String, AuthError> {
        let mut guard = self.token.lock().await;
        if let Some(state) = guard.as_ref() {
            if state.expires_at > OffsetDateTime::now_utc() {
                return Ok(state.token.clone());
            }
        }
        let fresh = self.login().await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(token)
    }

    /// Force a fresh login, discarding any cached token (spec §4.B: a
    /// 401 on a dispatch call triggers exactly one re-login attempt).
    async fn force_refresh(&self) -> Result<String, AuthError> {
        let mut guard = self.token.lock().await;
        let fresh = self.login().await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(token)
    }

    /// `GET path`, returning `Ok(None)` for a `204 No Content` body (the
    /// poll endpoint's "nothing to claim" response).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, AuthError> {
        let token = self.ensure_token().await?;
        let response = self.send_get(path, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path, "token rejected, forcing refresh");
            let token = self.force_refresh().await?;
            let response = self.send_get(path, &token).await?;
            return Self::decode_optional(response).await;
        }

        Self::decode_optional(response).await
    }

    async fn send_get(&self, path: &str, token: &str) -> Result<reqwest::Response, AuthError> {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Transient(e.to_string()))
    }

    async fn decode_optional<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Option<T>, AuthError> {
        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::OK => {
                let body = response.bytes().await.map_err(|e| AuthError::Protocol(e.to_string()))?;
                if body.is_empty() {
                    return Ok(None);
                }
                serde_json::from_slice(&body)
                    .map(Some)
                    .map_err(|e| AuthError::Protocol(e.to_string()))
            }
            StatusCode::UNAUTHORIZED => Err(AuthError::AuthFailure("rejected after refresh".to_string())),
            status if status.is_client_error() => Err(AuthError::BadRequest(format!("{status}"))),
            status => Err(AuthError::Transient(format!("{status}"))),
        }
    }

    /// `POST path` with a JSON body, retrying exactly once on `401`.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AuthError> {
        let token = self.ensure_token().await?;
        let response = self.send_post(path, &token, body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path, "token rejected, forcing refresh");
            let token = self.force_refresh().await?;
            let response = self.send_post(path, &token, body).await?;
            return Self::decode_required(response).await;
        }

        Self::decode_required(response).await
    }

    async fn send_post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<reqwest::Response, AuthError> {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Transient(e.to_string()))
    }

    async fn decode_required<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AuthError> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED => response
                .json()
                .await
                .map_err(|e| AuthError::Protocol(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(AuthError::AuthFailure("rejected after refresh".to_string())),
            status if status.is_client_error() => Err(AuthError::BadRequest(format!("{status}"))),
            status => Err(AuthError::Transient(format!("{status}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn login_template(token: &str) -> ResponseTemplate {
        let expires = OffsetDateTime::now_utc() + time::Duration::hours(1);
        let expires_str = expires
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap();
        ResponseTemplate::new(200).set_body_json(json!({
            "token": token,
            "expires_at": expires_str,
        }))
    }

    #[tokio::test]
    async fn get_returns_none_on_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(login_template("tok-1"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jobs/poll"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri(), "user", "pass");
        let result: Option<serde_json::Value> = client.get("/jobs/poll").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn get_retries_once_after_401() {
        let server = MockServer::start().await;

        // first login consumes the single-use mock; any later login hits
        // the fallback mock and receives a different token.
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(login_template("tok-1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(login_template("tok-2"))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/poll"))
            .and(header("Authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jobs/poll"))
            .and(header("Authorization", "Bearer tok-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": "abc"})))
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri(), "user", "pass");
        let result: Option<serde_json::Value> = client.get("/jobs/poll").await.unwrap();
        assert_eq!(result.unwrap()["job_id"], "abc");
    }

    #[tokio::test]
    async fn login_rejection_surfaces_as_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri(), "user", "pass");
        let err = client.get::<serde_json::Value>("/jobs/poll").await.unwrap_err();
        assert!(matches!(err, AuthError::AuthFailure(_)));
    }
}
