//! Configuration file support for routesyncd
//!
//! Loads and validates the etcd connection settings from a JSON file.
//! Default location: ./routesyncd.json
//!
//! ```json
//! {
//!   "endpoints": ["https://10.0.0.1:2379"],
//!   "etcd_cert": "/etc/calico/etcd-cert.pem",
//!   "etcd_cert_key": "/etc/calico/etcd-key.pem",
//!   "etcd_ca": "/etc/calico/etcd-ca.pem"
//! }
//! ```

use crate::error::{Result, RouteSyncError};
use crate::shell::IP_CMD;
use crate::types::BLOCK_AFFINITY_PREFIX;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "./routesyncd.json";

/// Complete routesyncd configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteSyncConfig {
    /// etcd endpoints
    pub endpoints: Vec<String>,

    /// Client certificate (PEM)
    pub etcd_cert: String,

    /// Client private key (PEM)
    pub etcd_cert_key: String,

    /// Trusted CA bundle (PEM)
    pub etcd_ca: String,

    /// Dial timeout in seconds
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout_secs: u64,

    /// Key prefix to watch
    #[serde(default = "default_watch_prefix")]
    pub watch_prefix: String,

    /// Path to the `ip` binary
    #[serde(default = "default_ip_cmd")]
    pub ip_cmd: String,
}

fn default_dial_timeout() -> u64 {
    5
}

fn default_watch_prefix() -> String {
    BLOCK_AFFINITY_PREFIX.to_string()
}

fn default_ip_cmd() -> String {
    IP_CMD.to_string()
}

impl RouteSyncConfig {
    /// Load configuration from a JSON file.
    ///
    /// Unlike the optional tuning files of other daemons there is no
    /// fallback: without endpoints and credentials nothing can run.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| RouteSyncError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|e| {
            RouteSyncError::config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| RouteSyncError::config(e.to_string()))
    }

    /// Get dial timeout as Duration
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(RouteSyncError::config("endpoints must not be empty"));
        }

        if self.endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(RouteSyncError::config("endpoints must not contain blanks"));
        }

        for (field, value) in [
            ("etcd_cert", &self.etcd_cert),
            ("etcd_cert_key", &self.etcd_cert_key),
            ("etcd_ca", &self.etcd_ca),
        ] {
            if value.trim().is_empty() {
                return Err(RouteSyncError::config(format!("{} must be set", field)));
            }
        }

        if self.dial_timeout_secs == 0 {
            return Err(RouteSyncError::config("dial_timeout_secs must be > 0"));
        }

        if self.watch_prefix.is_empty() {
            return Err(RouteSyncError::config("watch_prefix must not be empty"));
        }

        if self.ip_cmd.is_empty() {
            return Err(RouteSyncError::config("ip_cmd must not be empty"));
        }

        Ok(())
    }
}
