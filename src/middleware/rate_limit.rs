//! Login rate limiting
//!
//! Fixed window per client address, configured with a rate spec `N-P` where
//! `P` is one of `S`, `M`, `H`, `D` (e.g. `10-M` is ten requests per minute).
//!
//! Every response from a limited route carries `X-RateLimit-Limit`,
//! `X-RateLimit-Remaining` and `X-RateLimit-Reset` (unix seconds). Refused
//! requests get 429 plus `Retry-After`.
//!
//! State lives in process memory only; [`RateLimiter::cleanup`] drops expired
//! windows and is called periodically by the server.

use super::client::ClientAddrPolicy;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Key for requests whose client address cannot be determined
const UNKNOWN_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateSpecError {
    #[error("expected <limit>-<period>, e.g. 10-M")]
    Format,
    #[error("limit must be a positive integer")]
    Limit,
    #[error("period must be one of S, M, H, D")]
    Period,
}

/// Requests allowed per period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSpec {
    pub limit: u32,
    pub period: Duration,
}

impl FromStr for RateSpec {
    type Err = RateSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (limit, period) = s.trim().split_once('-').ok_or(RateSpecError::Format)?;

        let limit: u32 = limit.trim().parse().map_err(|_| RateSpecError::Limit)?;
        if limit == 0 {
            return Err(RateSpecError::Limit);
        }

        let period = match period.trim().to_ascii_uppercase().as_str() {
            "S" => Duration::from_secs(1),
            "M" => Duration::from_secs(60),
            "H" => Duration::from_secs(60 * 60),
            "D" => Duration::from_secs(24 * 60 * 60),
            _ => return Err(RateSpecError::Period),
        };

        Ok(Self { limit, period })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of one rate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window ends
    pub reset_after: Duration,
}

impl RateLimitDecision {
    /// Unix timestamp at which the window resets
    pub fn reset_at(&self) -> i64 {
        let now = chrono::Utc::now().timestamp();
        now + self.reset_after.as_secs() as i64 + i64::from(self.reset_after.subsec_nanos() > 0)
    }

    /// Seconds to wait before retrying, at least one
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs() + u64::from(self.reset_after.subsec_nanos() > 0);
        secs.max(1)
    }
}

/// In-process fixed-window limiter keyed by client address
pub struct RateLimiter {
    spec: RateSpec,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(spec: RateSpec) -> Self {
        Self {
            spec,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn spec(&self) -> RateSpec {
        self.spec
    }

    /// Count one request from `client` and decide whether it may proceed
    pub fn check(&self, client: IpAddr) -> RateLimitDecision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.lock();

        let window = windows.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.spec.period {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        let allowed = window.count < self.spec.limit;
        if allowed {
            window.count += 1;
        }

        RateLimitDecision {
            allowed,
            limit: self.spec.limit,
            remaining: self.spec.limit.saturating_sub(window.count),
            reset_after: (window.started + self.spec.period).saturating_duration_since(now),
        }
    }

    /// Remove windows that have ended
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.started) < self.spec.period);
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, remaining = windows.len(), "Rate limiter cleanup");
        }
    }

    /// Number of tracked clients
    pub fn tracked(&self) -> usize {
        self.windows.lock().len()
    }
}

/// State for [`limit_rate`]
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub clients: ClientAddrPolicy,
}

pub async fn limit_rate(State(state): State<RateLimitState>, req: Request, next: Next) -> Response {
    let client = state.clients.resolve(&req).unwrap_or(UNKNOWN_CLIENT);
    let decision = state.limiter.check(client);

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        warn!(client = %client, path = %req.uri().path(), "Rate limit exceeded");
        let mut response = ApiError::RateLimited.into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(decision.retry_after_secs()));
        response
    };

    insert_headers(response.headers_mut(), &decision);
    response
}

fn insert_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(decision.reset_at()));
}
