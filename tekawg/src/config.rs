/*!
Configuration management for the AWG driver.
*/

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub connection: ConnectionConfig,
    pub upload: UploadConfig,
    pub bulk_read: BulkReadConfig,
}

impl DriverConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            upload: UploadConfig::default(),
            bulk_read: BulkReadConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: DriverConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Reject settings the driver cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.connection.retry_depth == 0 {
            bail!("connection.retry_depth must be at least 1");
        }
        if self.upload.packet_size == 0 {
            bail!("upload.packet_size must be at least 1 sample");
        }
        if self.upload.max_block_attempts == Some(0) {
            bail!("upload.max_block_attempts must be at least 1 when set");
        }
        if self.bulk_read.attempts == 0 {
            bail!("bulk_read.attempts must be at least 1");
        }
        Ok(())
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// TCP link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Instrument address
    pub address: String,

    /// Instrument SCPI socket port
    pub port: u16,

    /// Timeout for establishing the TCP connection in milliseconds
    pub connect_timeout_ms: u64,

    /// Per-read response timeout in milliseconds
    pub response_timeout_ms: u64,

    /// Sends attempted before a query fails with a timeout
    pub retry_depth: usize,
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 4001,
            connect_timeout_ms: 5000,
            response_timeout_ms: 1000,
            retry_depth: 3,
        }
    }
}

/// How the final partial block of an upload is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailValidation {
    /// Same `*ESR?` acknowledgment as full-size blocks
    Acknowledged,
    /// Send the tail without waiting for an acknowledgment
    Legacy,
}

/// Chunked upload settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Samples per full-size block
    pub packet_size: usize,

    /// Sends of one block before giving up; `None` retries forever
    pub max_block_attempts: Option<usize>,

    /// Validation applied to the final partial block
    pub tail_validation: TailValidation,

    /// Response timeout used while an upload is in progress, in milliseconds
    pub response_timeout_ms: u64,
}

impl UploadConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            packet_size: 20000,
            max_block_attempts: Some(8),
            tail_validation: TailValidation::Acknowledged,
            response_timeout_ms: 1000,
        }
    }
}

/// Binary block read-back settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkReadConfig {
    /// Failed reads tolerated before the read-back is abandoned
    pub attempts: usize,

    /// Pause after each failed read in milliseconds
    pub backoff_ms: u64,
}

impl BulkReadConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for BulkReadConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff_ms: 1000,
        }
    }
}
