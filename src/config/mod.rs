use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::scheduler::BoundaryPolicy;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Signing keys, salt and token lifetimes. Secrets have no defaults: they
/// must come from the config file (or environment) and are checked at
/// startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default)]
    pub access_token_key: String,
    #[serde(default)]
    pub refresh_token_key: String,
    #[serde(default)]
    pub password_salt: String,
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl_secs: i64,
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl_secs: i64,
    /// Initial admin user, seeded at startup. Leave the password empty to
    /// skip seeding.
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default)]
    pub admin_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            access_token_key: String::new(),
            refresh_token_key: String::new(),
            password_salt: String::new(),
            access_token_ttl_secs: default_access_token_ttl(),
            refresh_token_ttl_secs: default_refresh_token_ttl(),
            admin_username: default_admin_username(),
            admin_password: String::new(),
        }
    }
}

fn default_issuer() -> String {
    "reserva".to_string()
}

fn default_access_token_ttl() -> i64 {
    60 * 60 // 1 hour
}

fn default_refresh_token_ttl() -> i64 {
    3 * 60 * 60 // 3 hours
}

fn default_admin_username() -> String {
    "admin".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SchedulerConfig {
    /// Boundary rule for intervals sharing an endpoint. The default treats
    /// a tie on start instants as a conflict and lets back-to-back bookings
    /// touch.
    #[serde(default)]
    pub boundary_policy: BoundaryPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    /// Reject configurations that would run without signing material.
    pub fn validate(&self) -> Result<()> {
        if self.auth.access_token_key.is_empty() {
            bail!("auth.access_token_key must be set");
        }
        if self.auth.refresh_token_key.is_empty() {
            bail!("auth.refresh_token_key must be set");
        }
        if self.auth.access_token_key == self.auth.refresh_token_key {
            bail!("auth.access_token_key and auth.refresh_token_key must differ");
        }
        if self.auth.password_salt.is_empty() {
            bail!("auth.password_salt must be set");
        }
        Ok(())
    }
}
