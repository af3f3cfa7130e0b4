//! Configuration management
//!
//! One immutable [`Config`] is built at startup from a TOML file plus
//! `FAIL2REST_*` environment overrides and passed explicitly to every
//! component.

use crate::auth::CredentialStore;
use crate::middleware::rate_limit::RateSpec;
use anyhow::{bail, Context, Result};
use argon2::password_hash::PasswordHash;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Candidate config files tried in order when none is given explicitly
const DEFAULT_CONFIG_PATHS: &[&str] = &["fail2rest.toml", "/etc/fail2rest/config.toml"];

/// Secrets shipped in sample configs that must never reach production
const PLACEHOLDER_SECRETS: &[&str] = &["change-this-secret", "changeme", "secret"];

const MIN_SECRET_LEN: usize = 32;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthSettings,
    pub fail2ban: Fail2banSettings,
    pub logging: LoggingSettings,
}

/// HTTP listener and pipeline limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (default: 127.0.0.1)
    pub host: IpAddr,
    pub port: u16,
    /// Per-request deadline, also applied to fail2ban-client calls
    pub request_timeout_secs: u64,
    /// Request body ceiling in bytes
    pub max_body_bytes: usize,
    /// Honour X-Forwarded-For / X-Real-IP (only behind a trusted proxy)
    pub trust_proxy_headers: bool,
    /// Login rate limit, `N-P` with P one of S, M, H, D
    pub login_rate: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            request_timeout_secs: 30,
            max_body_bytes: 1024 * 1024,
            trust_proxy_headers: false,
            login_rate: "10-M".to_string(),
        }
    }
}

/// Configured login user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    /// Argon2 PHC string produced by `hash-password`
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_expiry_secs: u64,
    pub api_keys: Vec<String>,
    pub users: Vec<UserEntry>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_secs: 24 * 60 * 60,
            api_keys: Vec::new(),
            users: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Fail2banSettings {
    pub client_path: PathBuf,
    /// Run the client through `sudo -n`
    pub use_sudo: bool,
    pub sudo_path: PathBuf,
}

impl Default for Fail2banSettings {
    fn default() -> Self {
        Self {
            client_path: PathBuf::from("/usr/bin/fail2ban-client"),
            use_sudo: false,
            sudo_path: PathBuf::from("sudo"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load `.env`, the TOML file and environment overrides, then validate.
    ///
    /// `explicit` comes from `--config`; without it `FAIL2REST_CONFIG` and the
    /// default locations are tried. Running without any file is allowed as long
    /// as the environment supplies a valid secret.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var("FAIL2REST_CONFIG")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    DEFAULT_CONFIG_PATHS
                        .iter()
                        .map(PathBuf::from)
                        .find(|p| p.is_file())
                }),
        };

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `FAIL2REST_*` overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("FAIL2REST_HOST").and_then(|v| v.parse().ok()) {
            self.server.host = host;
        }

        if let Some(port) = var("FAIL2REST_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }

        if let Some(secret) = var("FAIL2REST_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Some(keys) = var("FAIL2REST_API_KEYS") {
            self.auth.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(path) = var("FAIL2REST_CLIENT_PATH") {
            self.fail2ban.client_path = PathBuf::from(path);
        }

        if let Some(val) = var("FAIL2REST_USE_SUDO") {
            self.fail2ban.use_sudo = val == "true" || val == "1";
        }

        if let Some(level) = var("FAIL2REST_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Reject configurations the server must not start with
    pub fn validate(&self) -> Result<()> {
        let secret = self.auth.jwt_secret.trim();
        if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret) {
            bail!("auth.jwt_secret must be set to a strong random value");
        }
        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            bail!("auth.jwt_secret must be at least {} bytes", MIN_SECRET_LEN);
        }

        if self.auth.token_expiry_secs == 0 {
            bail!("auth.token_expiry_secs must be greater than zero");
        }
        if self.server.request_timeout_secs == 0 {
            bail!("server.request_timeout_secs must be greater than zero");
        }
        if self.server.max_body_bytes == 0 {
            bail!("server.max_body_bytes must be greater than zero");
        }

        self.login_rate()?;

        for user in &self.auth.users {
            if user.username.is_empty() {
                bail!("auth.users entries need a username");
            }
            PasswordHash::new(&user.password_hash).map_err(|e| {
                anyhow::anyhow!("password_hash for user '{}' is not a PHC string: {}", user.username, e)
            })?;
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.token_expiry_secs)
    }

    pub fn login_rate(&self) -> Result<RateSpec> {
        self.server
            .login_rate
            .parse()
            .with_context(|| format!("Invalid server.login_rate '{}'", self.server.login_rate))
    }

    /// Credential material for the auth service
    pub fn credentials(&self) -> CredentialStore {
        CredentialStore {
            api_keys: self.auth.api_keys.clone(),
            users: self
                .auth
                .users
                .iter()
                .map(|u| (u.username.clone(), u.password_hash.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn valid() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = SECRET.to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.server.max_body_bytes, 1024 * 1024);
        assert_eq!(config.server.login_rate, "10-M");
        assert_eq!(config.fail2ban.client_path, PathBuf::from("/usr/bin/fail2ban-client"));
        assert!(!config.fail2ban.use_sudo);
        assert!(!config.server.trust_proxy_headers);
    }

    #[test]
    fn test_parse_toml() {
        let hash = crate::auth::AuthService::hash_password("pw").unwrap();
        let raw = format!(
            r#"
[server]
host = "0.0.0.0"
port = 9191
login_rate = "5-S"

[auth]
jwt_secret = "{SECRET}"
api_keys = ["abc"]

[[auth.users]]
username = "admin"
password_hash = "{hash}"

[fail2ban]
use_sudo = true
"#
        );

        let config = Config::from_toml(&raw).unwrap();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:9191");
        assert_eq!(config.auth.api_keys, vec!["abc"]);
        assert_eq!(config.auth.users[0].username, "admin");
        assert!(config.fail2ban.use_sudo);
        // Unset fields keep their defaults
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
        config.validate().unwrap();

        let creds = config.credentials();
        assert_eq!(creds.users.len(), 1);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[auth]\njwt_secret = \"{}\"", SECRET).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.auth.jwt_secret, SECRET);

        assert!(Config::from_file(Path::new("/nonexistent/fail2rest.toml")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("FAIL2REST_PORT", "7000"),
            ("FAIL2REST_API_KEYS", "one, two,,"),
            ("FAIL2REST_USE_SUDO", "1"),
            ("FAIL2REST_CLIENT_PATH", "/opt/fail2ban-client"),
            ("FAIL2REST_HOST", "not-an-ip"),
        ]);

        let mut config = valid();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.auth.api_keys, vec!["one", "two"]);
        assert!(config.fail2ban.use_sudo);
        assert_eq!(config.fail2ban.client_path, PathBuf::from("/opt/fail2ban-client"));
        // Unparsable values are ignored
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_validate_secret() {
        assert!(Config::default().validate().is_err());

        let mut config = valid();
        config.auth.jwt_secret = "change-this-secret".into();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = "too-short".into();
        assert!(config.validate().is_err());

        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rate_and_limits() {
        let mut config = valid();
        config.server.login_rate = "ten per minute".into();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.server.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_password_hash() {
        let mut config = valid();
        config.auth.users.push(UserEntry {
            username: "admin".into(),
            password_hash: "plaintext-password".into(),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("admin"));
    }
}
