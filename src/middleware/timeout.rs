//! Request deadline.
//!
//! Each request gets a [`Deadline`] extension. Handlers extract it and hand it
//! to the fail2ban adapter, so a child process never outlives its request.
//! The handler runs as its own task; once the deadline passes it gets a short
//! grace window to kill and reap its child, then it is aborted and the client
//! receives 408.

use crate::error::ApiError;
use crate::fail2ban::Deadline;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{error, warn};

/// Time allowed after the deadline for in-flight adapter cleanup
const CLEANUP_GRACE: Duration = Duration::from_millis(250);

/// Deadline used when a handler runs outside the timeout stage
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn enforce_deadline(
    State(timeout): State<Duration>,
    mut req: Request,
    next: Next,
) -> Response {
    let deadline = Deadline::after(timeout);
    req.extensions_mut().insert(deadline);

    let path = req.uri().path().to_string();
    let mut task = tokio::spawn(next.run(req));

    match tokio::time::timeout_at(deadline.instant(), &mut task).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            error!(path = %path, error = %e, "Request handler panicked");
            ApiError::Internal(format!("handler task failed: {}", e)).into_response()
        }
        Err(_) => {
            if tokio::time::timeout(CLEANUP_GRACE, &mut task).await.is_err() {
                task.abort();
            }
            warn!(path = %path, timeout_secs = timeout.as_secs_f64(), "Request timed out");
            ApiError::TimedOut.into_response()
        }
    }
}

impl<S> FromRequestParts<S> for Deadline
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Deadline>()
            .copied()
            .unwrap_or_else(|| Deadline::after(DEFAULT_REQUEST_TIMEOUT)))
    }
}
