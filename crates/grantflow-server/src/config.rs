use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use grantflow::ServerConfig as OAuthConfig;
use serde::{Deserialize, Serialize};

use crate::fixtures::FixturesConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Authorization server settings
    #[serde(default)]
    pub oauth: OAuthConfig,
    /// Clients and users seeded into the in-memory store at startup
    #[serde(default)]
    pub fixtures: FixturesConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        if self.storage.purge_interval.is_zero() {
            return Err("storage.purge_interval must be > 0".into());
        }
        self.oauth.validate().map_err(|e| format!("oauth: {e}"))?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(host, self.server.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// In-memory store housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// How often expired tokens, codes and device authorizations are dropped.
    #[serde(default = "default_purge_interval", with = "humantime_serde")]
    pub purge_interval: Duration,
}
fn default_purge_interval() -> Duration {
    Duration::from_secs(300)
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            purge_interval: default_purge_interval(),
        }
    }
}

/// Where the configuration path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// From the --config CLI argument
    CliArgument,
    /// From the GRANTFLOW_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (grantflow.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (GRANTFLOW_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Default configuration file name.
pub const DEFAULT_CONFIG_PATH: &str = "grantflow.toml";

/// Resolves the configuration path. Priority: CLI argument, then
/// `GRANTFLOW_CONFIG`, then [`DEFAULT_CONFIG_PATH`].
pub fn resolve_config_path(cli: Option<PathBuf>) -> (PathBuf, ConfigSource) {
    if let Some(path) = cli {
        return (path, ConfigSource::CliArgument);
    }
    if let Ok(path) = std::env::var("GRANTFLOW_CONFIG")
        && !path.is_empty()
    {
        return (PathBuf::from(path), ConfigSource::EnvironmentVariable);
    }
    (PathBuf::from(DEFAULT_CONFIG_PATH), ConfigSource::Default)
}

pub mod loader {
    use super::{AppConfig, DEFAULT_CONFIG_PATH};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., GRANTFLOW__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("GRANTFLOW")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
