//! hubbub-config: JSON5 configuration loading.
//!
//! Configuration lives at `~/.hubbub/config.json5` by default. Each server
//! section carries the plugin list for that connection plus the knobs the
//! baseline hooks need (nick, command prefix, ignore list). Everything else
//! is passed through to plugins untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
}

/// Configuration for one server connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Nick to use on this connection.
    #[serde(default = "default_nick")]
    pub nick: String,
    /// Prefix that marks a message as a command invocation.
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
    /// Channels to join after connecting.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Plugins to load for this connection, in load order.
    #[serde(default)]
    pub plugins: Vec<String>,
    /// Nicks whose events are dropped before any hook runs.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Plugin-specific settings, keyed by plugin name; opaque to the core.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub settings: HashMap<String, serde_json::Value>,
}

fn default_port() -> u16 {
    6667
}

fn default_nick() -> String {
    "hubbub".to_string()
}

fn default_prefix() -> String {
    "!".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_port(),
            nick: default_nick(),
            command_prefix: default_prefix(),
            channels: Vec::new(),
            plugins: Vec::new(),
            ignore: Vec::new(),
            settings: HashMap::new(),
        }
    }
}

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Port to listen on.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// Host to bind to.
    #[serde(default = "default_web_host")]
    pub host: String,
}

fn default_web_port() -> u16 {
    8080
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            host: default_web_host(),
        }
    }
}

/// Top-level hubbub configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Web server config.
    #[serde(default)]
    pub web: WebConfig,
    /// Server connections, keyed by a short server id.
    #[serde(default)]
    pub servers: HashMap<String, ServerConfig>,
}

impl BotConfig {
    /// Server ids in deterministic (sorted) order.
    pub fn server_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.servers.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Resolve the hubbub config directory (~/.hubbub/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".hubbub"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.hubbub/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<BotConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<BotConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(BotConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: BotConfig = json5::from_str(&content)?;
    Ok(config)
}

/// Where the reload path re-reads configuration from.
///
/// The core only ever sees this contract; tests substitute an in-memory
/// source.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<BotConfig, ConfigError>;
}

/// A `ConfigSource` backed by a JSON5 file on disk.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The default on-disk source (~/.hubbub/config.json5).
    pub fn default_path() -> Result<Self, ConfigError> {
        Ok(Self::new(config_file_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<BotConfig, ConfigError> {
        load_config_from(&self.path)
    }
}
