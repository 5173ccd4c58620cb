//! Type definitions for routesyncd

use std::fmt;

/// etcd key prefix under which Calico publishes block affinities.
pub const BLOCK_AFFINITY_PREFIX: &str = "/registry/crd.projectcalico.org/blockaffinities/";

/// `deleted` flag value meaning the binding is being torn down.
pub const DELETED_TRUE: &str = "true";

/// `deleted` flag value meaning the binding is live.
pub const DELETED_FALSE: &str = "false";

/// Lifecycle state published while a binding is being removed.
pub const STATE_PENDING_DELETION: &str = "pendingDeletion";

/// Lifecycle state published once a binding is committed.
pub const STATE_CONFIRMED: &str = "confirmed";

/// Decoded meaning of one block affinity write.
///
/// Fields are kept as published: missing fields are empty strings and
/// the policy decides whether the intent is actionable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteIntent {
    /// Destination prefix in CIDR notation
    pub cidr: String,
    /// Next-hop gateway (node address)
    pub node: String,
    /// Deletion flag, "true" or "false" on the wire
    pub deleted: String,
    /// Lifecycle tag
    pub state: String,
}

impl RouteIntent {
    /// Create a new RouteIntent
    pub fn new(
        cidr: impl Into<String>,
        node: impl Into<String>,
        deleted: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            cidr: cidr.into(),
            node: node.into(),
            deleted: deleted.into(),
            state: state.into(),
        }
    }
}

/// Kind of change observed on the watch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Value written or updated
    Put,
    /// Key removed from the store
    Delete,
}

impl EventKind {
    /// Returns the kind as a lowercase string for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Put => "put",
            EventKind::Delete => "delete",
        }
    }
}

/// One event observed on the watch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    /// Event kind
    pub kind: EventKind,
    /// Store key, for diagnostics only
    pub key: String,
    /// Raw serialized block affinity
    pub payload: Vec<u8>,
}

impl ChangeNotification {
    /// Create a value-written notification
    pub fn put(key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: EventKind::Put,
            key: key.into(),
            payload: payload.into(),
        }
    }

    /// Create a key-deleted notification
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Delete,
            key: key.into(),
            payload: Vec::new(),
        }
    }
}

/// One batch of notifications as delivered by a single watch response.
pub type NotificationBatch = Vec<ChangeNotification>;

/// What to do with the kernel routing table for one intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationDecision {
    /// Add route to `cidr` via `node`
    Install { cidr: String, node: String },
    /// Delete route to `cidr` via `node`
    Remove { cidr: String, node: String },
    /// Nothing to do
    Ignore,
}

impl ReconciliationDecision {
    /// Returns true for `Ignore`.
    pub fn is_ignore(&self) -> bool {
        matches!(self, ReconciliationDecision::Ignore)
    }
}

impl fmt::Display for ReconciliationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationDecision::Install { cidr, node } => {
                write!(f, "install {} via {}", cidr, node)
            }
            ReconciliationDecision::Remove { cidr, node } => {
                write!(f, "remove {} via {}", cidr, node)
            }
            ReconciliationDecision::Ignore => write!(f, "ignore"),
        }
    }
}

/// Kernel route mutation verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    /// `ip route add`
    Add,
    /// `ip route del`
    Del,
}

impl RouteAction {
    /// Returns the `ip route` subcommand.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteAction::Add => "add",
            RouteAction::Del => "del",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_intent_new() {
        let intent = RouteIntent::new("10.244.229.192/26", "12.1.0.252", "false", "confirmed");
        assert_eq!(intent.cidr, "10.244.229.192/26");
        assert_eq!(intent.node, "12.1.0.252");
        assert_eq!(intent.deleted, DELETED_FALSE);
        assert_eq!(intent.state, STATE_CONFIRMED);
    }

    #[test]
    fn test_route_intent_default_is_empty() {
        let intent = RouteIntent::default();
        assert!(intent.cidr.is_empty());
        assert!(intent.node.is_empty());
        assert!(intent.deleted.is_empty());
        assert!(intent.state.is_empty());
    }

    #[test]
    fn test_notification_constructors() {
        let put = ChangeNotification::put("/k", b"{}".to_vec());
        assert_eq!(put.kind, EventKind::Put);
        assert_eq!(put.payload, b"{}");

        let del = ChangeNotification::delete("/k");
        assert_eq!(del.kind, EventKind::Delete);
        assert!(del.payload.is_empty());
        assert_eq!(del.kind.as_str(), "delete");
    }

    #[test]
    fn test_decision_display() {
        let install = ReconciliationDecision::Install {
            cidr: "10.0.0.0/24".to_string(),
            node: "1.1.1.1".to_string(),
        };
        assert_eq!(install.to_string(), "install 10.0.0.0/24 via 1.1.1.1");

        let remove = ReconciliationDecision::Remove {
            cidr: "10.0.0.0/24".to_string(),
            node: "1.1.1.1".to_string(),
        };
        assert_eq!(remove.to_string(), "remove 10.0.0.0/24 via 1.1.1.1");
        assert!(!remove.is_ignore());
        assert_eq!(RouteAction::Del.as_str(), "del");

        assert!(ReconciliationDecision::Ignore.is_ignore());
        assert_eq!(ReconciliationDecision::Ignore.to_string(), "ignore");
    }
}
