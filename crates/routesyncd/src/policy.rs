//! Route reconciliation policy
//!
//! Calico deletes a block affinity in two steps: it first marks the record
//! `deleted: "true"` with state `pendingDeletion`, then removes it. Creation
//! goes through `pending` before reaching `confirmed`. Only those two end
//! points touch the kernel; every other combination is ignored.

use crate::types::{
    ReconciliationDecision, RouteIntent, DELETED_FALSE, DELETED_TRUE, STATE_CONFIRMED,
    STATE_PENDING_DELETION,
};

/// Map a decoded intent to a kernel action.
///
/// Matching is exact and case-sensitive. The removal row is tested first.
pub fn decide(intent: &RouteIntent) -> ReconciliationDecision {
    if intent.deleted == DELETED_TRUE && intent.state == STATE_PENDING_DELETION {
        return ReconciliationDecision::Remove {
            cidr: intent.cidr.clone(),
            node: intent.node.clone(),
        };
    }

    if intent.deleted == DELETED_FALSE && intent.state == STATE_CONFIRMED {
        return ReconciliationDecision::Install {
            cidr: intent.cidr.clone(),
            node: intent.node.clone(),
        };
    }

    ReconciliationDecision::Ignore
}
