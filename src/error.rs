//! API Errors and Response Envelope
//!
//! Every JSON body leaving the gateway has the shape
//! `{success, data?, error?, message?}`.

use crate::auth::AuthError;
use crate::fail2ban::Fail2banError;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Uniform response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying data
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    /// Attach a human-readable message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// Successful response with only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: Some(message.into()),
        }
    }

    /// Failed response
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Errors surfaced to HTTP clients
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Request timeout")]
    TimedOut,

    #[error("{0}")]
    PermissionRequired(String),

    #[error("{0}")]
    Upstream(String),

    #[error("Authentication not configured. Please configure API keys or users in the config file.")]
    AuthNotConfigured,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::TimedOut => StatusCode::REQUEST_TIMEOUT,
            ApiError::PermissionRequired(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::AuthNotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the log
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal error");
                "Internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidApiKey => ApiError::Unauthorized("Invalid API key".into()),
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid username or password".into())
            }
            AuthError::InvalidToken | AuthError::TokenExpired => {
                ApiError::Unauthorized("Invalid or expired token".into())
            }
            AuthError::NotConfigured => ApiError::AuthNotConfigured,
            AuthError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<Fail2banError> for ApiError {
    fn from(err: Fail2banError) -> Self {
        match err {
            Fail2banError::InvalidJailName(_) | Fail2banError::InvalidIp(_) => {
                ApiError::Validation(err.to_string())
            }
            Fail2banError::JailNotFound { .. } => ApiError::NotFound(err.to_string()),
            Fail2banError::PermissionDenied { .. } => ApiError::PermissionRequired(err.to_string()),
            Fail2banError::TimedOut => ApiError::TimedOut,
            Fail2banError::Spawn { .. }
            | Fail2banError::Io(_)
            | Fail2banError::CommandFailed { .. } => ApiError::Upstream(err.to_string()),
        }
    }
}

/// JSON body extractor whose rejections use the envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge;
    }
    ApiError::Validation(format!("Invalid request: {}", rejection.body_text()))
}
