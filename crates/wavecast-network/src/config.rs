//! Server configuration: defaults, an optional TOML file, then CLI flags

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Default HTTP/WebSocket port
pub const DEFAULT_PORT: u16 = 3000;

/// Default path the WebSocket upgrade is served on
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Default debounce window for file-change events, in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Configuration for [`crate::WavecastServer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// STL file whose contents are broadcast
    pub watch_path: PathBuf,
    pub port: u16,
    pub bind_address: IpAddr,
    /// Directory of client assets served over plain HTTP
    pub static_root: Option<PathBuf>,
    pub ws_path: String,
    pub debounce_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            watch_path: PathBuf::new(),
            port: DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            static_root: None,
            ws_path: DEFAULT_WS_PATH.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl ServerConfig {
    /// Config for watching `path` with every other setting at its default
    pub fn for_file(path: impl Into<PathBuf>) -> Self {
        Self {
            watch_path: path.into(),
            ..Self::default()
        }
    }

    /// Load a config file; keys it omits keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: ServerConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseToml {
                path: path.to_path_buf(),
                source: e,
            })?;
        info!("Loaded server config from {:?}", path);
        Ok(config)
    }

    /// Check the invariants the server relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingWatchPath);
        }
        if !self.ws_path.starts_with('/') {
            return Err(ConfigError::InvalidWsPath(self.ws_path.clone()));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Errors that can occur while assembling a [`ServerConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("No file to watch; pass --watch or set watch_path in the config file")]
    MissingWatchPath,
    #[error("WebSocket path must start with '/': {0:?}")]
    InvalidWsPath(String),
}

/// Command line for `wavecast-server`
#[derive(Parser, Debug, Default)]
#[command(name = "wavecast-server")]
#[command(about = "Broadcast an STL file to WebSocket viewers whenever it changes", long_about = None)]
pub struct ServerArgs {
    /// TOML config file; flags given on the command line take precedence
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// STL file to watch and broadcast
    #[arg(short, long, value_name = "FILE")]
    pub watch: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<IpAddr>,

    /// Directory of static client assets
    #[arg(long, value_name = "DIR")]
    pub static_root: Option<PathBuf>,

    /// Path of the WebSocket endpoint
    #[arg(long, value_name = "PATH")]
    pub ws_path: Option<String>,

    /// Debounce window for file changes in milliseconds
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerArgs {
    pub fn parse_args() -> Self {
        ServerArgs::parse()
    }

    /// Layer defaults, the config file and these flags, then validate
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(watch) = self.watch {
            config.watch_path = watch;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(root) = self.static_root {
            config.static_root = Some(root);
        }
        if let Some(ws_path) = self.ws_path {
            config.ws_path = ws_path;
        }
        if let Some(debounce_ms) = self.debounce_ms {
            config.debounce_ms = debounce_ms;
        }

        config.validate()?;
        Ok(config)
    }
}
