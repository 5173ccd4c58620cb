//! Route synchronization daemon for Calico block affinities
//!
//! Watches the block affinity prefix in etcd and mirrors each confirmed or
//! pending-deletion binding into the host routing table as
//! `ip route add|del <cidr> via <node>`.
//!
//! - [`watch`]: etcd prefix watch behind the [`NotificationSource`] seam
//! - [`decoder`]: block affinity JSON to [`RouteIntent`]
//! - [`policy`]: [`RouteIntent`] to [`ReconciliationDecision`]
//! - [`executor`]: decisions to `ip route` commands
//! - [`route_sync`]: the watch loop tying them together

pub mod commands;
pub mod config;
pub mod decoder;
pub mod error;
pub mod executor;
pub mod policy;
pub mod route_sync;
pub mod shell;
pub mod tls;
pub mod types;
pub mod watch;

pub use config::{RouteSyncConfig, DEFAULT_CONFIG_PATH};
pub use error::{Result, RouteSyncError};
pub use executor::{IpRouteExecutor, RouteExecutor};
pub use route_sync::{NotificationOutcome, RouteSync, SyncStats};
pub use tls::load_tls_options;
pub use types::*;
pub use watch::{EtcdWatchClient, NotificationSource};
