//! Client for the external identity service
//!
//! The identity service answers one question: does this login exist, and
//! if a password is supplied, does it match. Everything else about users
//! lives there.

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Outcome of an identity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Ok,
    NotFound,
    /// Login exists but the supplied credentials were rejected
    Invalid,
}

/// Login to verify, with an optional password
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityCheck {
    pub login: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl IdentityCheck {
    pub fn with_password(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: Some(password.into()),
        }
    }

    /// Existence check only
    pub fn existence(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityClientError {
    #[error("identity service unreachable: {0}")]
    Transport(String),

    #[error("identity service timed out after {0:?}")]
    Timeout(Duration),

    #[error("identity service returned unexpected status {0}")]
    UnexpectedStatus(u16),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, check: &IdentityCheck) -> Result<Verification, IdentityClientError>;
}

/// Map an identity service response status onto a verification outcome
pub fn classify_status(status: StatusCode) -> Result<Verification, IdentityClientError> {
    if status.is_success() {
        return Ok(Verification::Ok);
    }

    match status {
        StatusCode::NOT_FOUND => Ok(Verification::NotFound),
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Ok(Verification::Invalid)
        }
        other => Err(IdentityClientError::UnexpectedStatus(other.as_u16())),
    }
}

/// HTTP implementation calling `POST {base_url}{verify_path}`
#[derive(Clone)]
pub struct HttpIdentityClient {
    http: HttpClient,
    verify_url: String,
    timeout: Duration,
}

impl HttpIdentityClient {
    pub fn new(base_url: &str, verify_path: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build identity HTTP client: {}", e))?;

        Ok(Self {
            http,
            verify_url: join_url(base_url, verify_path),
            timeout,
        })
    }

    pub fn verify_url(&self) -> &str {
        &self.verify_url
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityClient {
    async fn verify(&self, check: &IdentityCheck) -> Result<Verification, IdentityClientError> {
        let request = self.http.post(&self.verify_url).json(check).send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => {
                warn!(login = %check.login, "Identity service request timed out");
                return Err(IdentityClientError::Timeout(self.timeout));
            }
            Ok(Err(e)) => {
                warn!(login = %check.login, error = %e, "Identity service request failed");
                return Err(IdentityClientError::Transport(e.to_string()));
            }
            Err(_) => {
                warn!(login = %check.login, "Identity service request timed out");
                return Err(IdentityClientError::Timeout(self.timeout));
            }
        };

        let status = response.status();
        let outcome = classify_status(status);
        debug!(
            login = %check.login,
            with_password = check.password.is_some(),
            status = status.as_u16(),
            "Identity service responded"
        );
        outcome
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK).unwrap(), Verification::Ok);
        assert_eq!(
            classify_status(StatusCode::NO_CONTENT).unwrap(),
            Verification::Ok
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND).unwrap(),
            Verification::NotFound
        );
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED).unwrap(),
            Verification::Invalid
        );
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY),
            Err(IdentityClientError::UnexpectedStatus(502))
        ));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://identity:8080/", "/api/v1/users/verify"),
            "http://identity:8080/api/v1/users/verify"
        );
        assert_eq!(
            join_url("http://identity:8080", "verify"),
            "http://identity:8080/verify"
        );
    }

    #[test]
    fn test_existence_check_omits_password() {
        let body = serde_json::to_value(IdentityCheck::existence("alice")).unwrap();
        assert_eq!(body, serde_json::json!({ "login": "alice" }));

        let body = serde_json::to_value(IdentityCheck::with_password("alice", "pw")).unwrap();
        assert_eq!(body, serde_json::json!({ "login": "alice", "password": "pw" }));
    }
}
