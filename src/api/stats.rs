//! Statistics endpoints

use super::AppState;
use crate::error::{ApiError, ApiResponse};
use crate::fail2ban::{Deadline, JailStats, StatsRecord};
use axum::extract::{Path, State};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct JailStatsResponse {
    pub jail: String,
    pub stats: JailStats,
    pub timestamp: i64,
}

/// Aggregate over all jails; jails that fail to answer are left out
pub async fn overall_stats(
    State(state): State<AppState>,
    deadline: Deadline,
) -> Result<ApiResponse<StatsRecord>, ApiError> {
    let stats = state.fail2ban.overall_stats(deadline).await?;
    Ok(ApiResponse::ok(stats))
}

pub async fn jail_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
    deadline: Deadline,
) -> Result<ApiResponse<JailStatsResponse>, ApiError> {
    let stats = state.fail2ban.jail_stats(&name, deadline).await?;
    Ok(ApiResponse::ok(JailStatsResponse {
        jail: name,
        stats,
        timestamp: chrono::Utc::now().timestamp(),
    }))
}
