//! RouteSync - the watch loop
//!
//! Pulls batches from a [`NotificationSource`] one at a time and drives each
//! notification through decode, policy and executor in arrival order. A
//! notification is fully applied before the next one is looked at, so an
//! install and a later remove for the same CIDR always reach the kernel in
//! that order.

use tracing::{debug, error, info, instrument, warn};

use crate::decoder;
use crate::error::{Result, RouteSyncError};
use crate::executor::RouteExecutor;
use crate::policy;
use crate::types::{ChangeNotification, EventKind, ReconciliationDecision};
use crate::watch::NotificationSource;

/// What happened to one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Route added
    Installed,
    /// Route deleted
    Removed,
    /// Policy decided nothing should change
    Ignored,
    /// Store-level key deletion, not acted upon
    KeyDeleted,
    /// Payload could not be decoded
    DecodeFailed,
    /// Executor reported a failure
    ApplyFailed,
}

/// Running counters, logged when the loop exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub batches: u64,
    pub notifications: u64,
    pub installed: u64,
    pub removed: u64,
    pub ignored: u64,
    pub key_deletions: u64,
    pub decode_failures: u64,
    pub apply_failures: u64,
}

impl SyncStats {
    fn record(&mut self, outcome: &NotificationOutcome) {
        self.notifications += 1;
        match outcome {
            NotificationOutcome::Installed => self.installed += 1,
            NotificationOutcome::Removed => self.removed += 1,
            NotificationOutcome::Ignored => self.ignored += 1,
            NotificationOutcome::KeyDeleted => self.key_deletions += 1,
            NotificationOutcome::DecodeFailed => self.decode_failures += 1,
            NotificationOutcome::ApplyFailed => self.apply_failures += 1,
        }
    }
}

/// Forwards route deltas from the store to the kernel.
///
/// Holds no route state of its own: the store is the source of truth.
pub struct RouteSync<S, E> {
    source: S,
    executor: E,
    stats: SyncStats,
}

impl<S, E> RouteSync<S, E>
where
    S: NotificationSource,
    E: RouteExecutor,
{
    /// Create a new RouteSync over an opened source.
    pub fn new(source: S, executor: E) -> Self {
        Self {
            source,
            executor,
            stats: SyncStats::default(),
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Returns the executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Process notifications until the stream ends or fails.
    ///
    /// Only returns on a fatal condition: a stream that ends yields
    /// [`RouteSyncError::WatchStreamEnded`]. The source is closed before
    /// returning.
    pub async fn run(&mut self) -> Result<()> {
        info!(prefix = %self.source.prefix(), "Listening for block affinity changes");

        let err = self.pump().await;

        self.source.close().await;
        error!(error = %err, stats = ?self.stats, "Watch loop stopped");
        Err(err)
    }

    async fn pump(&mut self) -> RouteSyncError {
        loop {
            let batch = match self.source.next_batch().await {
                Ok(Some(batch)) => batch,
                Ok(None) => {
                    return RouteSyncError::WatchStreamEnded {
                        prefix: self.source.prefix().to_string(),
                    }
                }
                Err(e) => return e,
            };

            self.stats.batches += 1;
            debug!(events = batch.len(), "Received watch batch");

            for notification in batch {
                self.process_notification(&notification).await;
            }
        }
    }

    /// Close the source without waiting for the stream to end.
    pub async fn shutdown(&mut self) {
        self.source.close().await;
        info!(stats = ?self.stats, "RouteSync shut down");
    }

    /// Drive one notification through decode, policy and executor.
    ///
    /// Failures are logged and contained here.
    #[instrument(skip_all, fields(key = %notification.key, kind = notification.kind.as_str()))]
    pub async fn process_notification(
        &mut self,
        notification: &ChangeNotification,
    ) -> NotificationOutcome {
        let outcome = self.handle(notification).await;
        self.stats.record(&outcome);
        outcome
    }

    async fn handle(&mut self, notification: &ChangeNotification) -> NotificationOutcome {
        if notification.kind == EventKind::Delete {
            // Removal is driven by the deleted/state fields, not key deletion
            debug!("Key deleted from store, ignoring");
            return NotificationOutcome::KeyDeleted;
        }

        let intent = match decoder::decode(&notification.payload) {
            Ok(intent) => intent,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable block affinity");
                return NotificationOutcome::DecodeFailed;
            }
        };

        let decision = policy::decide(&intent);
        let outcome = match &decision {
            ReconciliationDecision::Install { cidr, node } => {
                info!(%cidr, %node, "add the static route");
                NotificationOutcome::Installed
            }
            ReconciliationDecision::Remove { cidr, node } => {
                info!(%cidr, %node, "delete the static route");
                NotificationOutcome::Removed
            }
            ReconciliationDecision::Ignore => {
                debug!(deleted = %intent.deleted, state = %intent.state, "No route change");
                return NotificationOutcome::Ignored;
            }
        };

        match self.executor.apply(decision).await {
            Ok(()) => outcome,
            Err(e) => {
                warn!(error = %e, "Route command failed");
                NotificationOutcome::ApplyFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockRouteExecutor;
    use crate::types::NotificationBatch;
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    const CIDR: &str = "10.244.229.192/26";
    const NODE: &str = "12.1.0.252";

    struct ScriptedSource {
        batches: VecDeque<Result<NotificationBatch>>,
        closed: usize,
    }

    impl ScriptedSource {
        fn new(batches: Vec<Result<NotificationBatch>>) -> Self {
            Self {
                batches: batches.into(),
                closed: 0,
            }
        }
    }

    #[async_trait]
    impl NotificationSource for ScriptedSource {
        fn prefix(&self) -> &str {
            "/test/"
        }

        async fn next_batch(&mut self) -> Result<Option<NotificationBatch>> {
            self.batches.pop_front().transpose()
        }

        async fn close(&mut self) {
            self.closed += 1;
        }
    }

    fn payload(deleted: &str, state: &str) -> Vec<u8> {
        format!(
            r#"{{"spec":{{"cidr":"{}","node":"{}","deleted":"{}","state":"{}"}}}}"#,
            CIDR, NODE, deleted, state
        )
        .into_bytes()
    }

    fn install() -> ReconciliationDecision {
        ReconciliationDecision::Install {
            cidr: CIDR.to_string(),
            node: NODE.to_string(),
        }
    }

    fn remove() -> ReconciliationDecision {
        ReconciliationDecision::Remove {
            cidr: CIDR.to_string(),
            node: NODE.to_string(),
        }
    }

    #[tokio::test]
    async fn test_install_called_once() {
        let mut executor = MockRouteExecutor::new();
        executor
            .expect_apply()
            .with(eq(install()))
            .times(1)
            .returning(|_| Ok(()));

        let mut sync = RouteSync::new(ScriptedSource::new(vec![]), executor);
        let outcome = sync
            .process_notification(&ChangeNotification::put("/k", payload("false", "confirmed")))
            .await;
        assert_eq!(outcome, NotificationOutcome::Installed);
    }

    #[tokio::test]
    async fn test_ignore_never_reaches_executor() {
        let mut executor = MockRouteExecutor::new();
        executor.expect_apply().never();

        let mut sync = RouteSync::new(ScriptedSource::new(vec![]), executor);
        let outcome = sync
            .process_notification(&ChangeNotification::put("/k", payload("true", "confirmed")))
            .await;
        assert_eq!(outcome, NotificationOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_key_delete_not_translated() {
        let mut executor = MockRouteExecutor::new();
        executor.expect_apply().never();

        let mut sync = RouteSync::new(ScriptedSource::new(vec![]), executor);
        let outcome = sync
            .process_notification(&ChangeNotification::delete("/k"))
            .await;
        assert_eq!(outcome, NotificationOutcome::KeyDeleted);
    }

    #[tokio::test]
    async fn test_order_preserved_across_batches() {
        let mut seq = Sequence::new();
        let mut executor = MockRouteExecutor::new();
        executor
            .expect_apply()
            .with(eq(install()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        executor
            .expect_apply()
            .with(eq(remove()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        executor
            .expect_apply()
            .with(eq(install()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let source = ScriptedSource::new(vec![
            Ok(vec![
                ChangeNotification::put("/k", payload("false", "confirmed")),
                ChangeNotification::put("/k", payload("true", "pendingDeletion")),
            ]),
            Ok(vec![ChangeNotification::put(
                "/k",
                payload("false", "confirmed"),
            )]),
        ]);

        let mut sync = RouteSync::new(source, executor);
        let err = sync.run().await.unwrap_err();
        assert!(matches!(err, RouteSyncError::WatchStreamEnded { .. }));
        assert_eq!(sync.stats().batches, 2);
        assert_eq!(sync.stats().installed, 2);
        assert_eq!(sync.stats().removed, 1);
    }

    #[tokio::test]
    async fn test_apply_failure_contained() {
        let mut executor = MockRouteExecutor::new();
        executor.expect_apply().times(2).returning(|_| {
            Err(RouteSyncError::ShellCommandFailed {
                command: "ip route add".to_string(),
                exit_code: 2,
                output: "RTNETLINK answers: File exists".to_string(),
            })
        });

        let source = ScriptedSource::new(vec![Ok(vec![
            ChangeNotification::put("/a", payload("false", "confirmed")),
            ChangeNotification::put("/b", payload("true", "pendingDeletion")),
        ])]);

        let mut sync = RouteSync::new(source, executor);
        let err = sync.run().await.unwrap_err();
        assert!(matches!(err, RouteSyncError::WatchStreamEnded { .. }));
        assert_eq!(sync.stats().apply_failures, 2);
        assert_eq!(sync.stats().notifications, 2);
    }

    #[tokio::test]
    async fn test_transport_error_is_fatal_and_closes_source() {
        let mut executor = MockRouteExecutor::new();
        executor.expect_apply().never();

        let source = ScriptedSource::new(vec![Err(RouteSyncError::Watch(
            "watch 1 canceled by server: compacted".to_string(),
        ))]);

        let mut sync = RouteSync::new(source, executor);
        let err = sync.run().await.unwrap_err();
        assert!(matches!(err, RouteSyncError::Watch(_)));
        assert_eq!(sync.source.closed, 1);
    }

    #[tokio::test]
    async fn test_stream_end_closes_source() {
        let mut executor = MockRouteExecutor::new();
        executor.expect_apply().never();

        let mut sync = RouteSync::new(ScriptedSource::new(vec![]), executor);
        let err = sync.run().await.unwrap_err();
        assert!(matches!(err, RouteSyncError::WatchStreamEnded { .. }));
        assert_eq!(sync.source.closed, 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_source_each_call() {
        let mut executor = MockRouteExecutor::new();
        executor.expect_apply().never();

        let mut sync = RouteSync::new(ScriptedSource::new(vec![]), executor);
        sync.shutdown().await;
        sync.shutdown().await;
        assert_eq!(sync.source.closed, 2);
        assert_eq!(sync.stats(), &SyncStats::default());
    }

    #[test]
    fn test_stats_record() {
        let mut stats = SyncStats::default();
        stats.record(&NotificationOutcome::DecodeFailed);
        stats.record(&NotificationOutcome::Ignored);
        stats.record(&NotificationOutcome::KeyDeleted);
        assert_eq!(
            stats,
            SyncStats {
                notifications: 3,
                ignored: 1,
                key_deletions: 1,
                decode_failures: 1,
                ..SyncStats::default()
            }
        );
    }
}
