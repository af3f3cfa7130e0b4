//! Jail listing, inspection and lifecycle endpoints

use super::AppState;
use crate::error::{ApiError, ApiResponse};
use crate::fail2ban::{types::Fields, Deadline, JailAction, JailRecord};
use axum::extract::{Path, State};

pub async fn list_jails(
    State(state): State<AppState>,
    deadline: Deadline,
) -> Result<ApiResponse<Vec<JailRecord>>, ApiError> {
    let jails = state.fail2ban.jails(deadline).await?;
    Ok(ApiResponse::ok(jails.into_iter().map(JailRecord::named).collect()))
}

/// Jail with its status fields and banned addresses
pub async fn get_jail(
    State(state): State<AppState>,
    Path(name): Path<String>,
    deadline: Deadline,
) -> Result<ApiResponse<JailRecord>, ApiError> {
    let status = state.fail2ban.jail_status(&name, deadline).await?;
    Ok(ApiResponse::ok(JailRecord::from_status(name, status)))
}

pub async fn jail_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
    deadline: Deadline,
) -> Result<ApiResponse<Fields>, ApiError> {
    let status = state.fail2ban.jail_status(&name, deadline).await?;
    Ok(ApiResponse::ok(status))
}

async fn run_action(
    state: AppState,
    action: JailAction,
    name: String,
    deadline: Deadline,
) -> Result<ApiResponse<()>, ApiError> {
    state.fail2ban.jail_action(action, &name, deadline).await?;
    Ok(ApiResponse::message(format!("Jail {} successfully", action.past_tense())))
}

pub async fn start_jail(
    State(state): State<AppState>,
    Path(name): Path<String>,
    deadline: Deadline,
) -> Result<ApiResponse<()>, ApiError> {
    run_action(state, JailAction::Start, name, deadline).await
}

pub async fn stop_jail(
    State(state): State<AppState>,
    Path(name): Path<String>,
    deadline: Deadline,
) -> Result<ApiResponse<()>, ApiError> {
    run_action(state, JailAction::Stop, name, deadline).await
}

pub async fn restart_jail(
    State(state): State<AppState>,
    Path(name): Path<String>,
    deadline: Deadline,
) -> Result<ApiResponse<()>, ApiError> {
    run_action(state, JailAction::Restart, name, deadline).await
}

pub async fn reload_jail(
    State(state): State<AppState>,
    Path(name): Path<String>,
    deadline: Deadline,
) -> Result<ApiResponse<()>, ApiError> {
    run_action(state, JailAction::Reload, name, deadline).await
}
