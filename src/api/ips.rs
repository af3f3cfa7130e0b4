//! Ban list endpoints

use super::AppState;
use crate::error::{ApiError, ApiJson, ApiResponse};
use crate::fail2ban::Deadline;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct IpRequest {
    pub ip: String,
}

#[derive(Debug, Serialize)]
pub struct BannedIps {
    pub jail: String,
    pub banned_ips: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BanChange {
    pub jail: String,
    pub ip: String,
}

pub async fn banned_ips(
    State(state): State<AppState>,
    Path(name): Path<String>,
    deadline: Deadline,
) -> Result<ApiResponse<BannedIps>, ApiError> {
    let banned_ips = state.fail2ban.banned_ips(&name, deadline).await?;
    Ok(ApiResponse::ok(BannedIps {
        jail: name,
        banned_ips,
    }))
}

pub async fn ban_ip(
    State(state): State<AppState>,
    Path(name): Path<String>,
    deadline: Deadline,
    ApiJson(req): ApiJson<IpRequest>,
) -> Result<ApiResponse<BanChange>, ApiError> {
    let ip = state.fail2ban.ban_ip(&name, &req.ip, deadline).await?;
    Ok(ApiResponse::ok(BanChange {
        jail: name,
        ip: ip.to_string(),
    })
    .with_message("IP banned successfully"))
}

pub async fn unban_ip(
    State(state): State<AppState>,
    Path(name): Path<String>,
    deadline: Deadline,
    ApiJson(req): ApiJson<IpRequest>,
) -> Result<ApiResponse<BanChange>, ApiError> {
    let ip = state.fail2ban.unban_ip(&name, &req.ip, deadline).await?;
    Ok(ApiResponse::ok(BanChange {
        jail: name,
        ip: ip.to_string(),
    })
    .with_message("IP unbanned successfully"))
}
