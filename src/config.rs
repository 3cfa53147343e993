//! Configuration
//!
//! Settings come from a TOML file (default
//! `~/.config/ocpp-cp-simulator/config.toml`) with command line overrides on
//! top. A missing file yields the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

pub const APP_NAME: &str = "ocpp-cp-simulator";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("{0} is required (config file or command line)")]
    Missing(&'static str),

    #[error("central system URL must use ws:// or wss://, got {0}")]
    UnsupportedScheme(String),
}

/// Simulated OCPP 1.6 charge point with an HTTP control surface.
#[derive(Parser, Debug, Default)]
#[command(
    name = "ocpp-cp-simulator",
    version,
    about = "Simulated OCPP 1.6 charge point",
    long_about = "Connects to a central system as one charge point, keeps its state in a \
                  local SQLite store and exposes an HTTP control surface.\n\n\
                  Default config: ~/.config/ocpp-cp-simulator/config.toml"
)]
pub struct Cli {
    /// Charge point identity.
    #[arg(long)]
    pub cp: Option<String>,

    /// Central system WebSocket URL (ws:// or wss://).
    #[arg(long)]
    pub cs: Option<String>,

    /// Control surface port, 0 picks a random one.
    #[arg(long)]
    pub control_port: Option<u16>,

    /// Root directory of the state store.
    #[arg(long)]
    pub db: Option<String>,

    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "CP_SIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Drop the stored security profile back to 0 and forget its secrets.
    #[arg(long)]
    pub reset_security: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    #[validate(nested)]
    pub charge_point: ChargePointConfig,
    pub control: ControlConfig,
    #[validate(nested)]
    pub store: StoreConfig,
    pub security: SecurityConfig,
    #[validate(nested)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct ChargePointConfig {
    #[validate(length(min = 1, max = 48, message = "identity must be 1-48 characters"))]
    pub id: Option<String>,
    #[validate(url(message = "central system URL is not a valid URL"))]
    pub central_system_url: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub vendor: String,
    #[validate(length(min = 1, max = 20))]
    pub model: String,
    #[validate(length(max = 50))]
    pub firmware_version: String,
}

impl Default for ChargePointConfig {
    fn default() -> Self {
        Self {
            id: None,
            central_system_url: None,
            vendor: "Simulator".to_string(),
            model: "CP-SIM".to_string(),
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    pub host: String,
    /// 0 means a random free port.
    pub port: u16,
    /// Serve `/metrics` in Prometheus text format.
    pub metrics: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            metrics: true,
        }
    }
}

impl ControlConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct StoreConfig {
    #[validate(length(min = 1, message = "store path must not be empty"))]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// PEM file trusted for security profile 2 when no root certificate was
    /// installed by the central system.
    pub default_root_certificate: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    #[validate(length(min = 1))]
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Identity and endpoint the runtime cannot start without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub charge_point_id: String,
    pub central_system_url: String,
}

impl AppConfig {
    /// Load from `path`; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides. Returns a description of each one so the
    /// caller can log them once tracing is up.
    pub fn apply_cli(&mut self, cli: &Cli) -> Vec<String> {
        let mut applied = Vec::new();
        if let Some(id) = &cli.cp {
            applied.push(format!("charge_point.id = {}", id));
            self.charge_point.id = Some(id.clone());
        }
        if let Some(url) = &cli.cs {
            applied.push(format!("charge_point.central_system_url = {}", url));
            self.charge_point.central_system_url = Some(url.clone());
        }
        if let Some(port) = cli.control_port {
            applied.push(format!("control.port = {}", port));
            self.control.port = port;
        }
        if let Some(path) = &cli.db {
            applied.push(format!("store.path = {}", path));
            self.store.path = path.clone();
        }
        if let Some(level) = &cli.log_level {
            applied.push(format!("logging.level = {}", level));
            self.logging.level = level.clone();
        }
        applied
    }

    /// Validate the merged configuration and extract the required endpoint.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        self.validate()?;

        let charge_point_id = self
            .charge_point
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::Missing("charge point id"))?;
        let central_system_url = self
            .charge_point
            .central_system_url
            .clone()
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing("central system URL"))?;

        if !(central_system_url.starts_with("ws://") || central_system_url.starts_with("wss://"))
        {
            return Err(ConfigError::UnsupportedScheme(central_system_url));
        }

        Ok(Endpoint {
            charge_point_id,
            central_system_url,
        })
    }
}

/// `~/.config/ocpp-cp-simulator/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("config.toml")
}
