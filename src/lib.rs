//! fail2rest
//!
//! Authenticated REST gateway over `fail2ban-client`.
//!
//! # Architecture
//!
//! ```text
//! HTTP ──► pipeline ──► AuthService (protected routes) ──► handler
//!            │                                               │
//!            │  request id, security headers, logging,       ▼
//!            │  body limit, deadline, login rate limit   Fail2banClient
//!                                                            │
//!                                                 fail2ban-client <args>
//!                                                            │
//!                                                  text ──► parser ──► JSON
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod fail2ban;
pub mod middleware;
pub mod server;

pub use api::{build_router, AppState};
pub use auth::{AuthError, AuthService, Claims, Credential};
pub use config::Config;
pub use error::{ApiError, ApiResponse};
pub use fail2ban::{Deadline, Fail2banClient, Fail2banError};
pub use server::Server;
