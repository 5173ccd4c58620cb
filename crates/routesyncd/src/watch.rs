//! etcd watch subscription
//!
//! [`NotificationSource`] is the seam between the watch loop and the store.
//! [`EtcdWatchClient`] implements it over an etcd v3 prefix watch: each
//! watch response becomes one [`NotificationBatch`], in the order the server
//! sent it. Watching starts at the current revision; nothing that happened
//! before the watch was opened is replayed.

use async_trait::async_trait;
use etcd_client::{
    Client, ConnectOptions, EventType, TlsOptions, WatchOptions, WatchResponse, WatchStream,
    Watcher,
};
use tracing::{debug, info, instrument, warn};

use crate::config::RouteSyncConfig;
use crate::error::{Result, RouteSyncError};
use crate::types::{ChangeNotification, EventKind, NotificationBatch};

/// A lazy, non-restartable sequence of notification batches.
#[async_trait]
pub trait NotificationSource: Send {
    /// The watched key prefix.
    fn prefix(&self) -> &str;

    /// Wait for the next batch.
    ///
    /// `Ok(None)` means the stream ended and will not yield again.
    async fn next_batch(&mut self) -> Result<Option<NotificationBatch>>;

    /// Release the subscription. Safe to call more than once.
    async fn close(&mut self);
}

/// Prefix watch on etcd.
pub struct EtcdWatchClient {
    prefix: String,
    watcher: Option<Watcher>,
    stream: WatchStream,
}

impl EtcdWatchClient {
    /// Dial etcd over mutual TLS and open a watch on `config.watch_prefix`.
    ///
    /// Both steps share the configured dial timeout.
    #[instrument(skip_all, fields(endpoints = ?config.endpoints, prefix = %config.watch_prefix))]
    pub async fn connect(config: &RouteSyncConfig, tls: TlsOptions) -> Result<Self> {
        let timeout = config.dial_timeout();
        let options = ConnectOptions::new()
            .with_tls(tls)
            .with_connect_timeout(timeout);

        let open = async {
            let mut client = Client::connect(&config.endpoints, Some(options)).await?;
            let watch = client
                .watch(
                    config.watch_prefix.as_str(),
                    Some(WatchOptions::new().with_prefix()),
                )
                .await?;
            Ok::<_, RouteSyncError>(watch)
        };

        let (watcher, stream) = tokio::time::timeout(timeout, open)
            .await
            .map_err(|_| RouteSyncError::DialTimeout(timeout))??;

        info!(watch_id = watcher.watch_id(), "Watch established");

        Ok(Self {
            prefix: config.watch_prefix.clone(),
            watcher: Some(watcher),
            stream,
        })
    }
}

#[async_trait]
impl NotificationSource for EtcdWatchClient {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn next_batch(&mut self) -> Result<Option<NotificationBatch>> {
        loop {
            let Some(resp) = self.stream.message().await? else {
                return Ok(None);
            };

            if resp.canceled() {
                return Err(RouteSyncError::Watch(format!(
                    "watch {} canceled by server: {}",
                    resp.watch_id(),
                    resp.cancel_reason()
                )));
            }

            // Creation ack and progress notifications carry no events
            if resp.events().is_empty() {
                debug!(
                    watch_id = resp.watch_id(),
                    created = resp.created(),
                    "Watch response without events"
                );
                continue;
            }

            return Ok(Some(to_batch(&resp)));
        }
    }

    async fn close(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            match watcher.cancel().await {
                Ok(()) => info!(prefix = %self.prefix, "Watch closed"),
                Err(e) => warn!(prefix = %self.prefix, error = %e, "Failed to cancel watch"),
            }
        }
    }
}

fn to_batch(resp: &WatchResponse) -> NotificationBatch {
    resp.events()
        .iter()
        .filter_map(|event| {
            let Some(kv) = event.kv() else {
                debug!("Watch event without key-value, skipping");
                return None;
            };
            Some(to_notification(
                event_kind(event.event_type()),
                kv.key(),
                kv.value(),
            ))
        })
        .collect()
}

/// Map an etcd event type to [`EventKind`].
pub fn event_kind(event_type: EventType) -> EventKind {
    match event_type {
        EventType::Put => EventKind::Put,
        EventType::Delete => EventKind::Delete,
    }
}

/// Build a notification from raw etcd key/value bytes.
pub fn to_notification(kind: EventKind, key: &[u8], value: &[u8]) -> ChangeNotification {
    ChangeNotification {
        kind,
        key: String::from_utf8_lossy(key).into_owned(),
        payload: value.to_vec(),
    }
}
