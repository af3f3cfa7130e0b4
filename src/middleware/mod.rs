//! Request Pipeline
//!
//! Stages, outermost first:
//!
//! 1. [`request_id`]: correlation id extension and response header
//! 2. [`security_headers`]: hardening headers on every response
//! 3. [`logging`]: one line per request with its final status
//! 4. [`body_limit`]: request body ceiling
//! 5. [`timeout`]: per-request [`Deadline`](crate::fail2ban::Deadline)
//! 6. [`rate_limit`]: login route only
//! 7. [`auth`]: bearer token gate on protected routes
//!
//! Stages 1-5 wrap the whole router (see [`crate::api::build_router`]); 6 and 7
//! are route layers.

pub mod auth;
pub mod body_limit;
pub mod client;
pub mod logging;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod timeout;

pub use client::ClientAddrPolicy;
pub use rate_limit::{RateLimiter, RateSpec};
pub use request_id::RequestId;
