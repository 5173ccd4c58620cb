//! Error types for routesyncd.
//!
//! Startup errors (`Config`, `Io`, `Tls`, `Store`, `DialTimeout`) and
//! stream errors (`WatchStreamEnded`, `Watch`) are fatal to the daemon.
//! Per-event errors (`Decode`, `InvalidRoute`, `ShellExec`,
//! `ShellCommandFailed`) are logged by the watch loop and never escape it.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for routesyncd operations.
pub type Result<T> = std::result::Result<T, RouteSyncError>;

/// Errors that can occur in routesyncd.
#[derive(Debug, Error)]
pub enum RouteSyncError {
    /// Configuration could not be parsed or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading a local file failed.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Client credentials or CA bundle could not be loaded.
    #[error("TLS setup failed for {path}: {source}")]
    Tls {
        /// The credential file that failed to load.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Dialing or talking to etcd failed.
    #[error("etcd error: {0}")]
    Store(#[from] etcd_client::Error),

    /// Connecting and opening the watch took longer than the dial timeout.
    #[error("Timed out after {0:?} connecting to etcd")]
    DialTimeout(Duration),

    /// The watch was canceled or otherwise rejected by the server.
    #[error("Watch error: {0}")]
    Watch(String),

    /// The watch stream ended; the daemon has nothing left to do.
    #[error("Watch stream on '{prefix}' ended")]
    WatchStreamEnded {
        /// The watched key prefix.
        prefix: String,
    },

    /// A notification payload was not a JSON document of the expected shape.
    #[error("Failed to decode route payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Route arguments are empty or not an address/prefix.
    #[error("Invalid route {cidr} via {gateway}: {reason}")]
    InvalidRoute {
        /// Destination prefix as published.
        cidr: String,
        /// Gateway as published.
        gateway: String,
        /// Why the route was rejected.
        reason: String,
    },

    /// Failed to spawn the route command.
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Route command returned non-zero exit code.
    #[error("Shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },
}

impl RouteSyncError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
