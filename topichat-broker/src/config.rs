//! Broker configuration.
//!
//! Layered, highest priority first: CLI arguments, environment variables
//! (clap `env` attributes), TOML config file
//! (`~/.config/topichat-broker/config.toml`), compiled defaults. The bind
//! address is validated into a [`SocketAddr`] at load time so a typo fails
//! before the listener is spawned.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::broker::DEFAULT_MAX_PAYLOAD_SIZE;

const DEFAULT_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000);
const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors that can occur when loading broker configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The configured bind address is not a valid socket address.
    #[error("invalid bind address {value:?}: {source}")]
    InvalidBindAddr {
        /// Value as given on the CLI or in the file.
        value: String,
        /// Underlying parse error.
        source: std::net::AddrParseError,
    },
}

/// CLI arguments for the broker.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "topichat pub/sub broker")]
pub struct BrokerCliArgs {
    /// Socket address to listen on (e.g. `0.0.0.0:8000`).
    #[arg(short, long, env = "TOPICHAT_BROKER_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/topichat-broker/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum publish payload size in bytes.
    #[arg(long)]
    pub max_payload_bytes: Option<usize>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "TOPICHAT_BROKER_LOG")]
    pub log_level: Option<String>,
}

/// On-disk config shape. Every field is optional so a file can override
/// just the one knob it cares about.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BrokerConfigFile {
    listen: ListenSection,
    limits: LimitsSection,
    log: LogSection,
}

/// `[listen]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ListenSection {
    addr: Option<String>,
}

/// `[limits]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LimitsSection {
    max_payload_bytes: Option<usize>,
}

/// `[log]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LogSection {
    level: Option<String>,
}

impl BrokerConfigFile {
    /// Reads and parses a config file.
    ///
    /// With an explicit path, any read failure is an error. Without one,
    /// the default path is tried and a missing file yields the empty
    /// config.
    fn read(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit_path {
            let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
            return Ok(toml::from_str(&contents)?);
        }

        let Some(path) = default_config_path() else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::ReadFile { path, source: e }),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("topichat-broker").join("config.toml"))
}

/// Fully resolved broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Validated address the listener binds to.
    pub bind_addr: SocketAddr,
    /// Maximum allowed publish payload size in bytes.
    pub max_payload_size: usize,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl BrokerConfig {
    /// Loads configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or if the winning bind address does not parse as a socket address.
    pub fn load(cli: &BrokerCliArgs) -> Result<Self, ConfigError> {
        let file = BrokerConfigFile::read(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Merges one layer stack into a validated config. Priority per field:
    /// CLI > file > default.
    fn resolve(cli: &BrokerCliArgs, file: &BrokerConfigFile) -> Result<Self, ConfigError> {
        let bind_addr = match cli.bind.as_deref().or(file.listen.addr.as_deref()) {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidBindAddr {
                value: raw.to_string(),
                source: e,
            })?,
            None => DEFAULT_BIND,
        };

        Ok(Self {
            bind_addr,
            max_payload_size: cli
                .max_payload_bytes
                .or(file.limits.max_payload_bytes)
                .unwrap_or(DEFAULT_MAX_PAYLOAD_SIZE),
            log_level: cli
                .log_level
                .clone()
                .or_else(|| file.log.level.clone())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}
