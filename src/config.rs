//! Configuration for the debug visualization server
//!
//! Loads configuration from a TOML file. Every field has a sensible
//! default so an embedding application can also build the config in code
//! and override only what it needs.

use crate::error::Result;
use crate::messages::server_info::CoordinateFrame;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub protocol: ProtocolConfig,
    pub logging: LoggingConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// TCP bind address for viewer connections
    ///
    /// Examples:
    /// - `0.0.0.0:17177` - Bind to all interfaces
    /// - `127.0.0.1:0` - Localhost, OS-assigned port
    pub listen_address: String,

    /// Accept connections on a background thread instead of explicit polls
    pub async_accept: bool,
}

/// Wire protocol behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolConfig {
    /// Batch small packets into collated units before sending
    pub collate: bool,

    /// Gzip each collated unit (requires `collate`)
    pub compress: bool,

    /// Microseconds per protocol time unit advertised to viewers
    pub time_unit_us: u64,

    /// Default frame interval in time units
    pub default_frame_time: u32,

    /// Coordinate frame the scene is authored in
    pub coordinate_frame: CoordinateFrame,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log output (stdout, stderr, or file path)
    pub output: String,
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                listen_address: "0.0.0.0:17177".to_string(),
                async_accept: true,
            },
            protocol: ProtocolConfig {
                collate: true,
                compress: false,
                time_unit_us: 1000,
                default_frame_time: 33,
                coordinate_frame: CoordinateFrame::Xyz,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                output: "stdout".to_string(),
            },
        }
    }
}
