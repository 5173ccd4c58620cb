//! Block affinity payload decoding
//!
//! The payload is the JSON form of a Calico `BlockAffinity` resource. Only
//! `spec.cidr`, `spec.node`, `spec.deleted` and `spec.state` are read; any
//! other field is ignored and any missing one decodes as an empty string.

use serde::Deserialize;

use crate::error::Result;
use crate::types::RouteIntent;

#[derive(Debug, Default, Deserialize)]
struct BlockAffinity {
    #[serde(default)]
    spec: BlockAffinitySpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BlockAffinitySpec {
    cidr: String,
    node: String,
    deleted: String,
    state: String,
}

/// Decode one notification payload into a [`RouteIntent`].
///
/// Fails only when the payload is not a JSON object of the expected shape
/// (truncated, not an object, or a field of the wrong type).
pub fn decode(payload: &[u8]) -> Result<RouteIntent> {
    let affinity: BlockAffinity = serde_json::from_slice(payload)?;
    let BlockAffinitySpec {
        cidr,
        node,
        deleted,
        state,
    } = affinity.spec;

    Ok(RouteIntent {
        cidr,
        node,
        deleted,
        state,
    })
}
