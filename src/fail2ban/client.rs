//! Typed fail2ban operations.

use super::parser;
use super::runner::{CommandRunner, ProcessRunner};
use super::types::{Fields, JailStats, StatsRecord, StatusRecord};
use super::{validate_jail_name, Deadline, Fail2banError};
use crate::config::Fail2banSettings;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Jail lifecycle subcommands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JailAction {
    Start,
    Stop,
    Restart,
    Reload,
}

impl JailAction {
    pub fn subcommand(&self) -> &'static str {
        match self {
            JailAction::Start => "start",
            JailAction::Stop => "stop",
            JailAction::Restart => "restart",
            JailAction::Reload => "reload",
        }
    }

    /// Past tense for response messages
    pub fn past_tense(&self) -> &'static str {
        match self {
            JailAction::Start => "started",
            JailAction::Stop => "stopped",
            JailAction::Restart => "restarted",
            JailAction::Reload => "reloaded",
        }
    }
}

/// Ban-list mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BanAction {
    Ban,
    Unban,
}

impl BanAction {
    fn subcommand(&self) -> &'static str {
        match self {
            BanAction::Ban => "banip",
            BanAction::Unban => "unbanip",
        }
    }
}

/// fail2ban client adapter
#[derive(Clone)]
pub struct Fail2banClient {
    runner: Arc<dyn CommandRunner>,
}

impl Fail2banClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Build the process-backed client from configuration
    pub fn from_settings(settings: &Fail2banSettings) -> Self {
        let mut runner = ProcessRunner::new(settings.client_path.clone());
        if settings.use_sudo {
            runner = runner.with_elevation(settings.sudo_path.clone());
        }
        Self::new(Arc::new(runner))
    }

    /// Overall status: summary fields and jail names
    pub async fn status(&self, deadline: Deadline) -> Result<StatusRecord, Fail2banError> {
        let output = self.runner.run(&["status"], deadline).await?;
        Ok(parser::parse_status(&output))
    }

    /// Status fields for one jail
    pub async fn jail_status(&self, jail: &str, deadline: Deadline) -> Result<Fields, Fail2banError> {
        let jail = validate_jail_name(jail)?;
        let output = self.runner.run(&["status", jail], deadline).await?;
        Ok(parser::parse_fields(&output))
    }

    /// Names of all configured jails
    pub async fn jails(&self, deadline: Deadline) -> Result<Vec<String>, Fail2banError> {
        let output = self.runner.run(&["status"], deadline).await?;
        Ok(parser::parse_jail_list(&output))
    }

    /// Addresses currently banned in a jail
    pub async fn banned_ips(&self, jail: &str, deadline: Deadline) -> Result<Vec<String>, Fail2banError> {
        let jail = validate_jail_name(jail)?;
        let output = self.runner.run(&["get", jail, "banned"], deadline).await?;
        Ok(parser::parse_banned(&output))
    }

    /// Ban an address. `ip` is parsed before any process is spawned.
    pub async fn ban_ip(&self, jail: &str, ip: &str, deadline: Deadline) -> Result<IpAddr, Fail2banError> {
        self.change_ban(BanAction::Ban, jail, ip, deadline).await
    }

    /// Unban an address. `ip` is parsed before any process is spawned.
    pub async fn unban_ip(&self, jail: &str, ip: &str, deadline: Deadline) -> Result<IpAddr, Fail2banError> {
        self.change_ban(BanAction::Unban, jail, ip, deadline).await
    }

    async fn change_ban(
        &self,
        action: BanAction,
        jail: &str,
        ip: &str,
        deadline: Deadline,
    ) -> Result<IpAddr, Fail2banError> {
        let jail = validate_jail_name(jail)?;
        let addr: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| Fail2banError::InvalidIp(ip.to_string()))?;
        let addr_arg = addr.to_string();

        self.runner
            .run(&["set", jail, action.subcommand(), addr_arg.as_str()], deadline)
            .await?;

        info!(jail = %jail, ip = %addr, action = action.subcommand(), "Ban list changed");
        Ok(addr)
    }

    pub async fn start_jail(&self, jail: &str, deadline: Deadline) -> Result<(), Fail2banError> {
        self.jail_action(JailAction::Start, jail, deadline).await
    }

    pub async fn stop_jail(&self, jail: &str, deadline: Deadline) -> Result<(), Fail2banError> {
        self.jail_action(JailAction::Stop, jail, deadline).await
    }

    pub async fn restart_jail(&self, jail: &str, deadline: Deadline) -> Result<(), Fail2banError> {
        self.jail_action(JailAction::Restart, jail, deadline).await
    }

    pub async fn reload_jail(&self, jail: &str, deadline: Deadline) -> Result<(), Fail2banError> {
        self.jail_action(JailAction::Reload, jail, deadline).await
    }

    /// Run a lifecycle subcommand; success is a zero exit status
    pub async fn jail_action(
        &self,
        action: JailAction,
        jail: &str,
        deadline: Deadline,
    ) -> Result<(), Fail2banError> {
        let jail = validate_jail_name(jail)?;
        self.runner.run(&[action.subcommand(), jail], deadline).await?;
        info!(jail = %jail, action = action.subcommand(), "Jail lifecycle command succeeded");
        Ok(())
    }

    /// Statistics subset of one jail's status
    pub async fn jail_stats(&self, jail: &str, deadline: Deadline) -> Result<JailStats, Fail2banError> {
        let status = self.jail_status(jail, deadline).await?;
        Ok(JailStats::from_status(&status))
    }

    /// Statistics across all jails.
    ///
    /// A jail whose status call fails is left out of the details and the total
    /// instead of failing the aggregate. A timeout is not a per-jail failure
    /// and aborts the whole call.
    pub async fn overall_stats(&self, deadline: Deadline) -> Result<StatsRecord, Fail2banError> {
        let jails = self.jails(deadline).await?;

        let mut jail_details = BTreeMap::new();
        let mut total_banned_ips = 0u64;

        for jail in &jails {
            match self.jail_stats(jail, deadline).await {
                Ok(stats) => {
                    total_banned_ips += stats.currently_banned_count();
                    jail_details.insert(jail.clone(), stats);
                }
                Err(Fail2banError::TimedOut) => return Err(Fail2banError::TimedOut),
                Err(e) => {
                    warn!(jail = %jail, error = %e, "Skipping jail in statistics");
                }
            }
        }

        Ok(StatsRecord {
            jail_count: jails.len(),
            jails,
            total_banned_ips,
            jail_details,
            timestamp: chrono::Utc::now().timestamp(),
        })
    }

    /// Reachability probe used by `/health` and at startup
    pub async fn ping(&self, deadline: Deadline) -> Result<(), Fail2banError> {
        self.runner.run(&["ping"], deadline).await.map(|_| ())
    }
}
