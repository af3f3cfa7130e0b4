//! fail2ban Control Adapter
//!
//! Drives `fail2ban-client` one subprocess per call and turns its text output
//! into typed records.
//!
//! # Layout
//!
//! - [`parser`]: line-oriented parsers for the tool's output
//! - [`runner`]: process execution with deadline enforcement
//! - [`client`]: typed operations (status, jails, bans, lifecycle, stats)
//! - [`types`]: records returned to the API layer

pub mod client;
pub mod parser;
pub mod runner;
pub mod types;

use std::time::Duration;
use thiserror::Error;

pub use client::{Fail2banClient, JailAction};
pub use runner::{CommandRunner, ProcessRunner};
pub use types::{JailRecord, JailStats, StatsRecord, StatusRecord};

/// Remediation hint attached to permission failures
const ELEVATION_HINT: &str = "fail2ban requires root privileges. Either run the server as root, \
     or set 'use_sudo = true' in the [fail2ban] config section and configure passwordless sudo \
     for fail2ban-client.";

/// Adapter errors
#[derive(Debug, Error)]
pub enum Fail2banError {
    #[error("Invalid jail name: {0:?}")]
    InvalidJailName(String),

    #[error("Invalid IP address: {0:?}")]
    InvalidIp(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to fail2ban-client: {0}")]
    Io(#[from] std::io::Error),

    #[error("Permission denied: {hint} Output: {output}", hint = ELEVATION_HINT)]
    PermissionDenied { output: String },

    #[error("Jail not found: {output}")]
    JailNotFound { output: String },

    #[error("fail2ban-client exited with {}: {output}", exit_label(.code))]
    CommandFailed { code: Option<i32>, output: String },

    #[error("fail2ban-client did not finish before the request deadline")]
    TimedOut,
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Absolute instant by which a call must finish.
///
/// The timeout middleware stores one per request; handlers pass it through to
/// every adapter call so the child process dies with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(tokio::time::Instant);

impl Deadline {
    /// Deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self(tokio::time::Instant::now() + timeout)
    }

    pub fn instant(&self) -> tokio::time::Instant {
        self.0
    }

    /// Time left before the deadline (zero once passed)
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(tokio::time::Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Validate a jail name before it becomes a process argument.
///
/// Names are opaque, but one starting with `-` would be read as an option and
/// whitespace or control characters never occur in real jail names.
pub fn validate_jail_name(name: &str) -> Result<&str, Fail2banError> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && !name.chars().any(|c| c.is_whitespace() || c.is_control());

    if valid {
        Ok(name)
    } else {
        Err(Fail2banError::InvalidJailName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_jail_name() {
        assert!(validate_jail_name("sshd").is_ok());
        assert!(validate_jail_name("nginx-http-auth").is_ok());
        assert!(validate_jail_name("recidive.local").is_ok());

        assert!(validate_jail_name("").is_err());
        assert!(validate_jail_name("--help").is_err());
        assert!(validate_jail_name("ssh d").is_err());
        assert!(validate_jail_name("sshd\n").is_err());
    }

    #[test]
    fn test_deadline_ordering() {
        let near = Deadline::after(Duration::from_millis(10));
        let far = Deadline::after(Duration::from_secs(60));
        assert_eq!(near.min(far), near);
        assert_eq!(far.min(near), near);
        assert!(!far.is_expired());
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let deadline = Deadline::after(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_error_messages() {
        let err = Fail2banError::CommandFailed {
            code: Some(255),
            output: "boom".into(),
        };
        assert_eq!(err.to_string(), "fail2ban-client exited with status 255: boom");

        let err = Fail2banError::CommandFailed {
            code: None,
            output: "".into(),
        };
        assert!(err.to_string().contains("a signal"));
    }
}
