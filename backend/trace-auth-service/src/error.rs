use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use crypto_core::TokenKind;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Access token is not valid")]
    AccessTokenInvalid,

    #[error("Refresh token is expired")]
    RefreshTokenExpired,

    #[error("Access token has not expired yet")]
    AccessTokenNotExpired,

    #[error("Invalid token type: expected {expected}, got {actual}")]
    InvalidTokenType {
        expected: TokenKind,
        actual: TokenKind,
    },

    #[error("Malformed token")]
    MalformedToken,

    #[error("Refresh token is not recognized")]
    RefreshNotRecognized,

    #[error("Trace {0} is already authorized")]
    TraceAlreadyAuthorized(String),

    #[error("Trace {0} is not authorized")]
    TraceNotAuthorized(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("Missing or invalid trace context")]
    MissingTraceContext,

    #[error("Missing authorization header")]
    MissingAuthorization,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Short stable label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::AuthenticationFailed(_) => "authentication_failed",
            AuthError::AccessTokenInvalid => "access_token_invalid",
            AuthError::RefreshTokenExpired => "refresh_token_expired",
            AuthError::AccessTokenNotExpired => "access_token_not_expired",
            AuthError::InvalidTokenType { .. } => "invalid_token_type",
            AuthError::MalformedToken => "malformed_token",
            AuthError::RefreshNotRecognized => "refresh_not_recognized",
            AuthError::TraceAlreadyAuthorized(_) => "trace_already_authorized",
            AuthError::TraceNotAuthorized(_) => "trace_not_authorized",
            AuthError::AccessDenied => "access_denied",
            AuthError::MissingTraceContext => "missing_trace_context",
            AuthError::MissingAuthorization => "missing_authorization",
            AuthError::Validation(_) => "validation",
            AuthError::Redis(_) => "redis",
            AuthError::Internal(_) => "internal",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::AuthenticationFailed(_)
            | AuthError::AccessTokenInvalid
            | AuthError::RefreshTokenExpired
            | AuthError::MalformedToken
            | AuthError::RefreshNotRecognized
            | AuthError::MissingAuthorization => StatusCode::UNAUTHORIZED,
            AuthError::AccessTokenNotExpired
            | AuthError::InvalidTokenType { .. }
            | AuthError::MissingTraceContext
            | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::TraceAlreadyAuthorized(_) | AuthError::AccessDenied => {
                StatusCode::FORBIDDEN
            }
            AuthError::TraceNotAuthorized(_) => StatusCode::NOT_FOUND,
            AuthError::Redis(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = match self {
            // Don't leak internal details
            AuthError::Redis(_) | AuthError::Internal(_) => "Internal server error".to_string(),
            // Identity service detail stays in the logs
            AuthError::AuthenticationFailed(_) => "Authentication failed".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: message,
            code: status.as_u16(),
        })
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!("Redis error: {}", err);
        AuthError::Redis(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::Validation(err.to_string())
    }
}
