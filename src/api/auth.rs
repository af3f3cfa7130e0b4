//! Login endpoint

use super::AppState;
use crate::auth::Credential;
use crate::error::{ApiError, ApiJson, ApiResponse};
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// An API key wins over a username/password pair when both are sent
impl TryFrom<LoginRequest> for Credential {
    type Error = ApiError;

    fn try_from(req: LoginRequest) -> Result<Self, Self::Error> {
        if let Some(key) = non_empty(req.api_key) {
            return Ok(Credential::ApiKey(key));
        }

        match (non_empty(req.username), non_empty(req.password)) {
            (Some(username), Some(password)) => Ok(Credential::Password { username, password }),
            _ => Err(ApiError::Validation(
                "Either 'api_key' or 'username' and 'password' must be provided".into(),
            )),
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiError> {
    if !state.auth.has_auth_configured() {
        warn!("Login attempted but no API keys or users are configured");
        return Err(ApiError::AuthNotConfigured);
    }

    let credential = Credential::try_from(req)?;

    let issued = state.auth.login(&credential).map_err(|e| {
        warn!(credential = ?credential, "Login failed");
        ApiError::from(e)
    })?;

    info!(credential = ?credential, expires_at = %issued.expires_at, "Token issued");

    Ok(ApiResponse::ok(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}
