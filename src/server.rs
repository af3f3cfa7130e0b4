//! HTTP Server
//!
//! Binds the listener, probes fail2ban once, runs the rate-limiter sweeper and
//! serves until Ctrl+C or SIGTERM.

use crate::api::{build_router, AppState};
use crate::config::Config;
use crate::fail2ban::Deadline;
use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

/// How often expired rate-limit windows are dropped
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Deadline for the startup reachability probe
const STARTUP_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Server {
    config: Config,
    state: AppState,
}

impl Server {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let state = AppState::from_config(&config)?;
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Log a warning if fail2ban-client cannot be reached; never fatal
    pub async fn probe_fail2ban(&self) -> bool {
        match self
            .state
            .fail2ban
            .ping(Deadline::after(STARTUP_PROBE_TIMEOUT))
            .await
        {
            Ok(()) => {
                info!(client = %self.config.fail2ban.client_path.display(), "fail2ban-client reachable");
                true
            }
            Err(e) => {
                warn!(error = %e, "fail2ban-client is not reachable; requests will fail until it is");
                false
            }
        }
    }

    /// Start the server and run until shutdown signal
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.socket_addr();

        if !self.state.auth.has_auth_configured() {
            warn!("No API keys or users configured; every login will be refused");
        }
        if self.config.fail2ban.use_sudo {
            info!(sudo = %self.config.fail2ban.sudo_path.display(), "Running fail2ban-client through sudo");
        }

        self.probe_fail2ban().await;

        let limiter = self.state.login_limiter.clone();
        let sweeper = tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        });

        let router = build_router(self.state);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!(%addr, version = env!("CARGO_PKG_VERSION"), "fail2rest listening");

        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        sweeper.abort();
        served.context("Server error")?;

        info!("Server shut down gracefully");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = "server-test-secret-0123456789abcdef".into();
        config.fail2ban.client_path = "/nonexistent/fail2ban-client".into();
        config
    }

    #[test]
    fn test_server_new() {
        let server = Server::new(config()).unwrap();
        assert!(!server.state().auth.has_auth_configured());
        assert_eq!(server.state().login_limiter.spec().limit, 10);
    }

    #[test]
    fn test_server_new_rejects_bad_rate() {
        let mut config = config();
        config.server.login_rate = "lots".into();
        assert!(Server::new(config).is_err());
    }

    #[tokio::test]
    async fn test_probe_is_not_fatal() {
        let server = Server::new(config()).unwrap();
        assert!(!server.probe_fail2ban().await);
    }
}
