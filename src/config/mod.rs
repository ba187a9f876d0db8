use crate::utils::error::{DestPoolError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub loopback: LoopbackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_max_connections_per_address")]
    pub max_connections_per_address: usize,
    #[serde(default = "default_max_queue_size_per_address")]
    pub max_queue_size_per_address: usize,
}

/// Timings for the in-memory loopback transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopbackConfig {
    #[serde(default = "default_connect_latency_ms")]
    pub connect_latency_ms: u64,
    #[serde(default = "default_exchange_latency_ms")]
    pub exchange_latency_ms: u64,
    #[serde(default)]
    pub fail_connect: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String, // "json" or "pretty"
}

// Default values
fn default_max_connections_per_address() -> usize {
    8
}

fn default_max_queue_size_per_address() -> usize {
    1024
}

fn default_connect_latency_ms() -> u64 {
    5
}

fn default_exchange_latency_ms() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_connections_per_address: default_max_connections_per_address(),
            max_queue_size_per_address: default_max_queue_size_per_address(),
        }
    }
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            connect_latency_ms: default_connect_latency_ms(),
            exchange_latency_ms: default_exchange_latency_ms(),
            fail_connect: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DestPoolError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| DestPoolError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.client.validate()?;

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(DestPoolError::Config(format!(
                "Invalid log format: {}. Must be 'pretty' or 'json'",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Create example configuration file
    pub fn create_example<P: AsRef<Path>>(path: P) -> Result<()> {
        let example = r#"[client]
max_connections_per_address = 8
max_queue_size_per_address = 1024

# In-memory transport used by the workload simulator
[loopback]
connect_latency_ms = 5
exchange_latency_ms = 10
fail_connect = false

[logging]
level = "info"  # Options: "trace", "debug", "info", "warn", "error"
format = "pretty"  # Options: "pretty", "json"
"#;

        std::fs::write(path.as_ref(), example).map_err(|e| {
            DestPoolError::Config(format!("Failed to write example config: {}", e))
        })?;

        Ok(())
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_connections_per_address == 0 {
            return Err(DestPoolError::Config(
                "max_connections_per_address must be at least 1".to_string(),
            ));
        }

        if self.max_queue_size_per_address == 0 {
            return Err(DestPoolError::Config(
                "max_queue_size_per_address must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
