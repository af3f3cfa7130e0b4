//! Daemon status endpoint

use super::AppState;
use crate::error::{ApiError, ApiResponse};
use crate::fail2ban::{Deadline, StatusRecord};
use axum::extract::State;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: StatusRecord,
    pub timestamp: i64,
}

pub async fn overall_status(
    State(state): State<AppState>,
    deadline: Deadline,
) -> Result<ApiResponse<StatusResponse>, ApiError> {
    let status = state.fail2ban.status(deadline).await?;

    Ok(ApiResponse::ok(StatusResponse {
        status,
        timestamp: chrono::Utc::now().timestamp(),
    }))
}
