//! Daemon configuration
//!
//! Configuration is fixed at startup: the ordered knock sequence, the knock
//! timeout, the command port, and the set of decoy ports to monitor.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for the portcullis daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Address to bind all listeners to
    pub bind_address: String,

    /// Ordered port sequence that grants authorization
    pub knock_sequence: Vec<u16>,

    /// Maximum gap between two consecutive knocks before the partial
    /// sequence is discarded
    #[serde(with = "duration_secs")]
    pub knock_timeout: Duration,

    /// Port the command session listener binds
    pub command_port: u16,

    /// Decoy ports to monitor for knocks
    pub listen_ports: Vec<u16>,

    /// Upper bound on a single shell command execution
    #[serde(with = "duration_secs")]
    pub shell_timeout: Duration,

    /// How long shutdown waits for in-flight sessions to drain
    #[serde(with = "duration_secs")]
    pub shutdown_grace: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let knock_sequence = vec![7000, 8000, 9000];

        Self {
            bind_address: "0.0.0.0".to_string(),
            listen_ports: knock_sequence.clone(),
            knock_sequence,
            knock_timeout: Duration::from_secs(10),
            command_port: 9999,
            shell_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl DaemonConfig {
    /// Socket address string for the command listener
    pub fn command_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.command_port)
    }

    /// Socket address string for a knock listener
    pub fn knock_address(&self, port: u16) -> String {
        format!("{}:{}", self.bind_address, port)
    }

    /// Check the configuration for contradictions
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.knock_sequence.is_empty() {
            return Err(ConfigError::Invalid(
                "knock_sequence must contain at least one port".to_string(),
            ));
        }

        if self.listen_ports.contains(&self.command_port) {
            return Err(ConfigError::Invalid(format!(
                "command_port {} collides with a monitored port",
                self.command_port
            )));
        }

        for port in &self.knock_sequence {
            if !self.listen_ports.contains(port) {
                return Err(ConfigError::Invalid(format!(
                    "knock sequence port {} is not among the monitored ports",
                    port
                )));
            }
        }

        Ok(())
    }
}

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portcullis")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

// Helper module for Duration serialization as plain seconds
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
