//! Reconnect subscription claims and per-subscription results.

use lens_codec::PatchOp;
use serde::{Deserialize, Serialize};

use crate::SnapshotData;

/// The field set a client claims for one subscription: the `"*"` wildcard
/// or an explicit list of field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    /// A single string; `"*"` means all fields, anything else names one.
    One(String),
    /// An explicit list of field names.
    Many(Vec<String>),
}

impl FieldSpec {
    /// The wildcard spec.
    pub fn all() -> Self {
        FieldSpec::One("*".to_string())
    }

    /// Whether this spec is the wildcard.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, FieldSpec::One(s) if s == "*")
    }

    /// The named fields, or `None` for the wildcard.
    pub fn names(&self) -> Option<Vec<String>> {
        match self {
            FieldSpec::One(s) if s == "*" => None,
            FieldSpec::One(s) => Some(vec![s.clone()]),
            FieldSpec::Many(names) => Some(names.clone()),
        }
    }
}

/// One subscription as the reconnecting client remembers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectSubscription {
    /// Client-side subscription id, echoed in the result.
    pub id: String,
    /// Entity type name.
    pub entity: String,
    /// Entity instance id.
    pub entity_id: String,
    /// Fields the client was subscribed to.
    pub fields: FieldSpec,
    /// Last entity version the client fully applied.
    pub version: u64,
    /// Optional content hash of the client's local state, hex-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<String>,
}

/// How one claimed subscription was reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectStatus {
    /// The client is already at the latest version.
    Current,
    /// The gap is bridged by the attached patch lists.
    Patched,
    /// The gap could not be served from the log; full state attached.
    Snapshot,
    /// The entity no longer exists (or never did).
    Deleted,
    /// Resolving this one subscription failed; the rest are unaffected.
    Error,
}

/// Per-subscription reconcile outcome inside a reconnect ack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectResult {
    /// Echo of the subscription id.
    pub id: String,
    /// Entity type name.
    pub entity: String,
    /// Entity instance id.
    pub entity_id: String,
    /// Outcome classification.
    pub status: ReconnectStatus,
    /// Current server-side entity version.
    pub version: u64,
    /// For `patched`: one patch list per missed version, oldest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patches: Option<Vec<Vec<PatchOp>>>,
    /// For `snapshot`: full current state, possibly compressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SnapshotData>,
    /// For `error`: what went wrong.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReconnectResult {
    /// A bare result with the given status and no payload.
    pub fn bare(sub: &ReconnectSubscription, status: ReconnectStatus, version: u64) -> Self {
        Self {
            id: sub.id.clone(),
            entity: sub.entity.clone(),
            entity_id: sub.entity_id.clone(),
            status,
            version,
            patches: None,
            data: None,
            error: None,
        }
    }
}
