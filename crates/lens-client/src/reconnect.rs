//! Client side of the reconnect protocol: building claims from the
//! mirror, and applying the server's per-subscription results.

use lens_codec::apply_patch;
use lens_value::EntityKey;
use lens_wire::{
    FieldSpec, ReconnectResult, ReconnectStatus, ReconnectSubscription, decompress_snapshot,
};

use crate::{ClientError, MirrorStore};

impl MirrorStore {
    /// Builds one reconnect claim per mirrored entity: last applied
    /// version plus a content hash so the server can verify `current`.
    pub fn reconnect_subscriptions(&self) -> Vec<ReconnectSubscription> {
        let mut keys: Vec<&EntityKey> = self.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| {
                let (entity, entity_id) = key.split();
                ReconnectSubscription {
                    id: key.to_string(),
                    entity: entity.to_string(),
                    entity_id: entity_id.to_string(),
                    fields: FieldSpec::all(),
                    version: self.version(entity, entity_id),
                    data_hash: self.entity_hash(entity, entity_id),
                }
            })
            .collect()
    }

    /// Applies one reconnect result to the mirror.
    pub fn apply_reconnect_result(&mut self, result: &ReconnectResult) -> Result<(), ClientError> {
        let key = EntityKey::new(&result.entity, &result.entity_id);
        match result.status {
            ReconnectStatus::Current => {}
            ReconnectStatus::Patched => {
                if let Some(patches) = &result.patches {
                    let state = self.entry(&key);
                    let mut current = state.clone();
                    for patch in patches {
                        current = apply_patch(&current, patch)?;
                    }
                    *state = current;
                }
                self.set_version(&key, result.version);
            }
            ReconnectStatus::Snapshot => {
                if let Some(data) = &result.data {
                    *self.entry(&key) = decompress_snapshot(data)?;
                }
                self.set_version(&key, result.version);
            }
            ReconnectStatus::Deleted => {
                self.remove(&result.entity, &result.entity_id);
            }
            ReconnectStatus::Error => {
                tracing::warn!(
                    entity = %result.entity,
                    id = %result.entity_id,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "reconnect result carried an error"
                );
            }
        }
        Ok(())
    }
}
