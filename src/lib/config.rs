//! Configuration for the client and the server, loaded with the `config`
//! crate from an optional TOML file plus environment overrides.
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::{
    ledger::{default_fleet, Bus},
    notify::NOTIFICATION_LIFETIME,
    scanner::ScannerConfig,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent with fare submissions and top-ups.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default = "default_notification_ms")]
    pub notification_ms: u64,
}

impl ClientConfig {
    /// Reads `path` if it exists. `BASE_URL` in the environment wins over
    /// the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                File::from(path.to_path_buf())
                    .required(false)
                    .format(FileFormat::Toml),
            )
            .set_override_option("base_url", std::env::var("BASE_URL").ok())?
            .build()?
            .try_deserialize()
    }

    pub fn notification_lifetime(&self) -> Duration {
        Duration::from_millis(self.notification_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory for the daily rolling log file. Logs go to stdout if unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub buses: Vec<Bus>,
}

impl ServerConfig {
    /// Reads `path` if given, then `FAREPASS_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path.to_path_buf())
                    .required(false)
                    .format(FileFormat::Toml),
            );
        }

        builder
            .add_source(Environment::with_prefix("FAREPASS").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// The configured fleet, or the default one when none is configured.
    pub fn fleet(&self) -> Vec<Bus> {
        if self.buses.is_empty() {
            default_fleet()
        } else {
            self.buses.clone()
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_notification_ms() -> u64 {
    NOTIFICATION_LIFETIME.as_millis() as u64
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
