//! Configuration system for the `topichat` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/topichat/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use topichat_proto::topic::SubscribeScope;

use crate::broker::ConnectOptions;

/// Errors that can occur when loading configuration.
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
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    broker: BrokerFileConfig,
    session: SessionFileConfig,
    ui: UiFileConfig,
}

/// `[broker]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BrokerFileConfig {
    url: Option<String>,
    connect_timeout_secs: Option<u64>,
    clean_session: Option<bool>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    room: Option<String>,
    name: Option<String>,
    peer: Option<String>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    timestamp_format: Option<String>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the chat client.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "topichat -- topic pub/sub chat client")]
pub struct CliArgs {
    /// Broker WebSocket URL.
    #[arg(short = 'u', long, env = "TOPICHAT_BROKER_URL")]
    pub broker_url: Option<String>,

    /// Room whose topics this session uses.
    #[arg(short, long, env = "TOPICHAT_ROOM")]
    pub room: Option<String>,

    /// Display name. Prompted for interactively when absent.
    #[arg(short, long, env = "TOPICHAT_NAME")]
    pub name: Option<String>,

    /// Restrict the session to one peer's messages instead of the whole room.
    #[arg(short, long)]
    pub peer: Option<String>,

    /// Resume broker-side subscription state from a previous session.
    #[arg(long)]
    pub resume_session: bool,

    /// Connection timeout in seconds.
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,

    /// Path to config file (default: `~/.config/topichat/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TOPICHAT_LOG")]
    pub log_level: String,

    /// Log file path (default: `topichat.log` in the temp directory).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Broker WebSocket URL (ws:// or wss://).
    pub broker_url: String,
    /// Room whose topics this session uses.
    pub room: String,
    /// Display name, when configured. `None` means prompt at startup.
    pub name: Option<String>,
    /// Peer to scope the subscription to, if any.
    pub peer: Option<String>,
    /// Whether to discard broker-side subscription state at connect.
    pub clean_session: bool,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// chrono format string for log timestamps.
    pub timestamp_format: String,
    /// Log level filter string.
    pub log_level: String,
    /// Log file path, if set.
    pub log_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            broker_url: "ws://127.0.0.1:8000/ws".to_string(),
            room: "chatroom".to_string(),
            name: None,
            peer: None,
            clean_session: true,
            connect_timeout: Duration::from_secs(10),
            timestamp_format: "%H:%M:%S".to_string(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            broker_url: cli
                .broker_url
                .clone()
                .or_else(|| file.broker.url.clone())
                .unwrap_or(defaults.broker_url),
            room: cli
                .room
                .clone()
                .or_else(|| file.session.room.clone())
                .unwrap_or(defaults.room),
            name: cli.name.clone().or_else(|| file.session.name.clone()),
            peer: cli.peer.clone().or_else(|| file.session.peer.clone()),
            clean_session: if cli.resume_session {
                false
            } else {
                file.broker
                    .clean_session
                    .unwrap_or(defaults.clean_session)
            },
            connect_timeout: Duration::from_secs(
                cli.connect_timeout_secs
                    .or(file.broker.connect_timeout_secs)
                    .unwrap_or(defaults.connect_timeout.as_secs()),
            ),
            timestamp_format: file
                .ui
                .timestamp_format
                .clone()
                .unwrap_or(defaults.timestamp_format),
            log_level: cli.log_level.clone(),
            log_file: cli.log_file.clone(),
        }
    }

    /// Subscription scope implied by the configuration: a configured peer
    /// narrows the session to that peer, otherwise the whole room.
    #[must_use]
    pub fn subscribe_scope(&self) -> SubscribeScope {
        if self.peer.is_some() {
            SubscribeScope::Peer
        } else {
            SubscribeScope::Room
        }
    }

    /// Builds broker connect options for a display name.
    ///
    /// The client id is derived from the name plus a UUIDv7 so concurrent
    /// sessions under the same name stay distinct at the broker.
    #[must_use]
    pub fn connect_options(&self, name: &str) -> ConnectOptions {
        ConnectOptions {
            client_id: format!("{name}-{}", uuid::Uuid::now_v7()),
            clean_session: self.clean_session,
            connect_timeout: self.connect_timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("topichat").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
