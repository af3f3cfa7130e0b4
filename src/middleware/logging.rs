//! Request logging.
//!
//! Wraps the limiting stages so rejected and timed-out requests are logged
//! with the status the client actually received.

use super::client::ClientAddrPolicy;
use super::request_id::RequestId;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{error, info, warn};

pub async fn log_requests(
    State(clients): State<ClientAddrPolicy>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let uri = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let client = clients
        .resolve(&req)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "-".to_string());
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .map(str::to_string)
        .unwrap_or_default();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let latency_ms = started.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        error!(%method, %uri, status, latency_ms, %client, %request_id, "Request failed");
    } else if response.status().is_client_error() {
        warn!(%method, %uri, status, latency_ms, %client, %request_id, "Request rejected");
    } else {
        info!(%method, %uri, status, latency_ms, %client, %request_id, "Request handled");
    }

    response
}
