//! Health Check API
//!
//! Unauthenticated. Reports `ok` when `fail2ban-client ping` answers and
//! `degraded` otherwise; the endpoint itself always returns 200 so load
//! balancers can tell "process up" from "fail2ban reachable".

use super::AppState;
use crate::error::ApiResponse;
use crate::fail2ban::Deadline;
use axum::extract::State;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

pub const SERVICE_NAME: &str = "fail2rest";

/// Upper bound on the reachability probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub fail2ban_reachable: bool,
    /// Timestamp (RFC 3339)
    pub time: String,
}

pub async fn health_check(
    State(state): State<AppState>,
    deadline: Deadline,
) -> ApiResponse<HealthResponse> {
    let probe_deadline = deadline.min(Deadline::after(PROBE_TIMEOUT));

    let reachable = match state.fail2ban.ping(probe_deadline).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "fail2ban health probe failed");
            false
        }
    };

    ApiResponse::ok(HealthResponse {
        status: if reachable { "ok" } else { "degraded" },
        service: SERVICE_NAME,
        version: state.version,
        uptime_secs: state.uptime_secs(),
        fail2ban_reachable: reachable,
        time: chrono::Utc::now().to_rfc3339(),
    })
}
