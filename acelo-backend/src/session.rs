// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Email/password authentication

use crate::error::{check_response, BackendError, Result};
use acelo_core::validation::{require, validate_email};
use acelo_core::config::BackendConfig;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Resolve the user id of an optional session, failing fast when absent
pub fn require_user(session: Option<&Session>) -> Result<&str> {
    session
        .map(|s| s.user_id.as_str())
        .filter(|id| !id.is_empty())
        .ok_or(BackendError::Unauthenticated)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

pub struct AuthClient {
    base_url: String,
    anon_key: String,
    client: reqwest::Client,
}

impl AuthClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Sign in with the password grant
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        validate_email(email)?;
        require("password", password)?;

        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "email": email.trim(), "password": password }))
            .send()
            .await?;

        let token: TokenResponse = check_response(response).await?.json().await?;
        let session = Session {
            access_token: token.access_token,
            user_id: token.user.id,
            email: token.user.email,
            expires_at: Utc::now() + Duration::seconds(token.expires_in.unwrap_or(3600)),
        };

        tracing::info!(user_id = %session.user_id, "Signed in");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acelo_core::ValidationError;

    fn config(url: &str) -> BackendConfig {
        BackendConfig {
            url: url.to_string(),
            anon_key: "anon".to_string(),
        }
    }

    #[test]
    fn test_require_user() {
        assert!(matches!(require_user(None), Err(BackendError::Unauthenticated)));
        let session = Session {
            access_token: "t".into(),
            user_id: "u1".into(),
            email: None,
            expires_at: Utc::now(),
        };
        assert_eq!(require_user(Some(&session)).unwrap(), "u1");
        assert_eq!(BackendError::Unauthenticated.to_string(), "No user ID");
    }

    #[tokio::test]
    async fn test_sign_in_validates_before_request() {
        let client = AuthClient::new(&config("http://127.0.0.1:9"));
        let err = client.sign_in("nope", "secret").await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Validation(ValidationError::InvalidEmail(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_in() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/v1/token")
            .match_query(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "password".into(),
            ))
            .match_header("apikey", "anon")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"jwt","expires_in":3600,"user":{"id":"user-1","email":"jo@example.com"}}"#,
            )
            .create_async()
            .await;

        let client = AuthClient::new(&config(&server.url()));
        let session = client.sign_in("jo@example.com", "secret").await.unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.access_token, "jwt");
        assert!(!session.is_expired(Utc::now()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sign_in_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
            .create_async()
            .await;

        let client = AuthClient::new(&config(&server.url()));
        match client.sign_in("jo@example.com", "wrong").await {
            Err(BackendError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid login credentials");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
