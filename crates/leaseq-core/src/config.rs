//! Server configuration. Set once at startup, immutable afterwards.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::server::DEFAULT_IDLE_TIMEOUT;
use crate::queue::{DEFAULT_MAX_PAYLOAD_LEN, StoreSettings};

/// Ten years. Keeps `now + lease` far away from `DateTime` overflow.
pub const MAX_LEASE_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Directory holding the snapshot file.
    pub storage_dir: PathBuf,
    pub lease_duration_secs: u64,
    pub max_payload_len: usize,
    /// Background sweep period; 0 keeps sweeping on the request path only.
    pub sweep_interval_ms: u64,
    /// Quiet time after which an unterminated request is answered.
    pub idle_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5555,
            storage_dir: PathBuf::from("."),
            lease_duration_secs: 4,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            sweep_interval_ms: 0,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lease_duration_secs == 0 {
            return Err(ConfigError::Invalid(
                "lease_duration_secs must be greater than 0".into(),
            ));
        }
        if self.lease_duration_secs > MAX_LEASE_DURATION_SECS {
            return Err(ConfigError::Invalid(format!(
                "lease_duration_secs {} exceeds {MAX_LEASE_DURATION_SECS}",
                self.lease_duration_secs
            )));
        }
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "idle_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.max_payload_len == 0 {
            return Err(ConfigError::Invalid(
                "max_payload_len must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Longest request line accepted: payload ceiling plus room for the
    /// verb, queue name, length and separators.
    pub fn max_line_len(&self) -> usize {
        self.max_payload_len.saturating_add(1024)
    }

    /// Store settings derived from this config. Call after `validate`.
    pub fn store_settings(&self) -> StoreSettings {
        let secs = self.lease_duration_secs.min(MAX_LEASE_DURATION_SECS) as i64;
        StoreSettings {
            lease_duration: Duration::seconds(secs),
            max_payload_len: self.max_payload_len,
        }
    }

    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Option<std::time::Duration> {
        (self.sweep_interval_ms > 0).then(|| std::time::Duration::from_millis(self.sweep_interval_ms))
    }
}
