//! Reconnect outcome resolution.
//!
//! For each subscription a reconnecting client claims, classify how to
//! bring it current: `current` (nothing to do), `patched` (replay logged
//! patches), `snapshot` (full state, the log could not serve), `deleted`
//! (the entity is gone), or `error` (this one claim failed; others are
//! unaffected).

use lens_value::{EntityKey, Value, content_hash, hash_hex};
use lens_wire::{ReconnectResult, ReconnectStatus, ReconnectSubscription, compress_snapshot};

use crate::GraphStateManager;
use crate::manager::{ARRAY_FIELD, ManagerInner, StatePolicy};

impl GraphStateManager {
    /// Resolves a batch of reconnect claims. One failing claim degrades to
    /// `status: "error"` without affecting the rest of the batch.
    pub fn resolve_reconnect(
        &self,
        subscriptions: &[ReconnectSubscription],
    ) -> Vec<ReconnectResult> {
        let inner = self.lock();
        subscriptions
            .iter()
            .map(|sub| match resolve_one(&inner, &self.policy, sub) {
                Ok(result) => result,
                Err(message) => {
                    tracing::warn!(
                        entity = %sub.entity,
                        id = %sub.entity_id,
                        %message,
                        "reconnect resolution failed"
                    );
                    let mut result =
                        ReconnectResult::bare(sub, ReconnectStatus::Error, sub.version);
                    result.error = Some(message);
                    result
                }
            })
            .collect()
    }
}

fn resolve_one(
    inner: &ManagerInner,
    policy: &StatePolicy,
    sub: &ReconnectSubscription,
) -> Result<ReconnectResult, String> {
    let key = EntityKey::new(&sub.entity, &sub.entity_id);
    let current_version = inner.versions.get(&key).copied().unwrap_or(0);

    // Arrays reconcile through the object path as a synthetic single-field
    // `_items` view, so hashing, patching, and snapshots are uniform.
    let state: Option<Value> = if let Some(map) = inner.canonical.get(&key) {
        Some(Value::Object(map.clone()))
    } else {
        inner.canonical_arrays.get(&key).map(|items| {
            let mut view = lens_value::Map::new();
            view.insert(ARRAY_FIELD.to_string(), Value::Array(items.clone()));
            Value::Object(view)
        })
    };

    let Some(state) = state else {
        return Ok(ReconnectResult::bare(sub, ReconnectStatus::Deleted, 0));
    };
    if current_version == 0 {
        return Ok(ReconnectResult::bare(sub, ReconnectStatus::Deleted, 0));
    }

    if sub.version >= current_version {
        let hash_matches = match &sub.data_hash {
            None => true,
            Some(claimed) => *claimed == hash_hex(content_hash(&state)),
        };
        if hash_matches {
            return Ok(ReconnectResult::bare(
                sub,
                ReconnectStatus::Current,
                current_version,
            ));
        }
        // Version claims current but the content does not: the client's
        // copy is unusable, send a snapshot.
        return snapshot_result(sub, &state, current_version, policy);
    }

    match inner.log.get_since(&key, sub.version) {
        Some(entries) if entries.is_empty() => Ok(ReconnectResult::bare(
            sub,
            ReconnectStatus::Current,
            current_version,
        )),
        Some(entries) => {
            let mut result =
                ReconnectResult::bare(sub, ReconnectStatus::Patched, current_version);
            result.patches = Some(entries.into_iter().map(|entry| entry.patch).collect());
            Ok(result)
        }
        None => snapshot_result(sub, &state, current_version, policy),
    }
}

fn snapshot_result(
    sub: &ReconnectSubscription,
    state: &Value,
    version: u64,
    policy: &StatePolicy,
) -> Result<ReconnectResult, String> {
    let data = compress_snapshot(state, &policy.compression).map_err(|e| e.to_string())?;
    let mut result = ReconnectResult::bare(sub, ReconnectStatus::Snapshot, version);
    result.data = Some(data);
    Ok(result)
}
