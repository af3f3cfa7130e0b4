//! HTTP API
//!
//! Routes (all JSON, envelope `{success, data?, error?, message?}`):
//!
//! - GET  /health                            - liveness + fail2ban reachability
//! - POST /api/v1/auth/login                 - exchange a credential for a token (rate limited)
//! - GET  /api/v1/status                     - daemon status
//! - GET  /api/v1/jails                      - jail names
//! - GET  /api/v1/jails/{name}               - jail with status fields and banned IPs
//! - GET  /api/v1/jails/{name}/status        - raw status fields
//! - POST /api/v1/jails/{name}/{action}      - start | stop | restart | reload
//! - GET  /api/v1/jails/{name}/banned        - banned addresses
//! - POST /api/v1/jails/{name}/ban           - `{ "ip": ... }`
//! - POST /api/v1/jails/{name}/unban         - `{ "ip": ... }`
//! - GET  /api/v1/stats                      - statistics across jails
//! - GET  /api/v1/jails/{name}/stats         - statistics for one jail
//!
//! Everything under `/api/v1` except login requires `Authorization: Bearer`.

pub mod auth;
pub mod health;
pub mod ips;
pub mod jails;
pub mod stats;
pub mod status;

use crate::auth::AuthService;
use crate::config::{Config, ServerConfig};
use crate::error::ApiError;
use crate::fail2ban::Fail2banClient;
use crate::middleware::{
    self, rate_limit::RateLimitState, ClientAddrPolicy, RateLimiter,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const API_PREFIX: &str = "/api/v1";

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub fail2ban: Fail2banClient,
    pub login_limiter: Arc<RateLimiter>,
    pub server: Arc<ServerConfig>,
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub version: &'static str,
}

impl AppState {
    pub fn new(
        auth: Arc<AuthService>,
        fail2ban: Fail2banClient,
        login_limiter: Arc<RateLimiter>,
        server: ServerConfig,
    ) -> Self {
        Self {
            auth,
            fail2ban,
            login_limiter,
            server: Arc::new(server),
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Wire every component from a validated config
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let auth = AuthService::new(&config.auth.jwt_secret, config.token_ttl(), config.credentials());
        let limiter = RateLimiter::new(config.login_rate()?);

        Ok(Self::new(
            Arc::new(auth),
            Fail2banClient::from_settings(&config.fail2ban),
            Arc::new(limiter),
            config.server.clone(),
        ))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

/// Build the router with every route and pipeline stage
pub fn build_router(state: AppState) -> Router {
    let clients = ClientAddrPolicy::new(state.server.trust_proxy_headers);
    let max_body = state.server.max_body_bytes;
    let timeout = state.request_timeout();

    let login = Router::new()
        .route("/auth/login", post(auth::login))
        .route_layer(from_fn_with_state(
            RateLimitState {
                limiter: state.login_limiter.clone(),
                clients,
            },
            middleware::rate_limit::limit_rate,
        ));

    let protected = Router::new()
        .route("/status", get(status::overall_status))
        .route("/stats", get(stats::overall_stats))
        .route("/jails", get(jails::list_jails))
        .route("/jails/{name}", get(jails::get_jail))
        .route("/jails/{name}/status", get(jails::jail_status))
        .route("/jails/{name}/start", post(jails::start_jail))
        .route("/jails/{name}/stop", post(jails::stop_jail))
        .route("/jails/{name}/restart", post(jails::restart_jail))
        .route("/jails/{name}/reload", post(jails::reload_jail))
        .route("/jails/{name}/banned", get(ips::banned_ips))
        .route("/jails/{name}/ban", post(ips::ban_ip))
        .route("/jails/{name}/unban", post(ips::unban_ip))
        .route("/jails/{name}/stats", get(stats::jail_stats))
        .route_layer(from_fn_with_state(
            state.auth.clone(),
            middleware::auth::require_auth,
        ));

    let router = Router::new()
        .route("/health", get(health::health_check))
        .nest(API_PREFIX, login.merge(protected))
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(from_fn_with_state(timeout, middleware::timeout::enforce_deadline))
        .layer(from_fn_with_state(max_body, middleware::body_limit::limit_body))
        .layer(from_fn_with_state(clients, middleware::logging::log_requests));

    middleware::request_id::apply(middleware::security_headers::apply(router))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".into())
}
