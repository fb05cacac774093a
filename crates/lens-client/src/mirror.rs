//! The local entity mirror and per-operation result mirror.

use std::collections::BTreeMap;

use lens_codec::{Update, apply_update};
use lens_command::{EmitCommand, apply_emit_command};
use lens_value::{EntityKey, Map, Value, content_hash, hash_hex};
use rustc_hash::FxHashMap;

use crate::ClientError;

/// Client-side copy of every entity the client has received updates for,
/// with the last fully-applied version per entity.
#[derive(Debug, Default)]
pub struct MirrorStore {
    entities: FxHashMap<EntityKey, Value>,
    versions: FxHashMap<EntityKey, u64>,
}

impl MirrorStore {
    /// Creates an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one `update` message: every per-field update lands on the
    /// local copy, then the entity's version advances.
    pub fn apply_update(
        &mut self,
        entity: &str,
        id: &str,
        version: u64,
        updates: &BTreeMap<String, Update>,
    ) -> Result<(), ClientError> {
        let key = EntityKey::new(entity, id);
        let state = self
            .entities
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        for (field, update) in updates {
            let base = state.get(field).cloned().unwrap_or(Value::Null);
            let applied = apply_update(&base, update)?;
            if let Value::Object(map) = state {
                map.insert(field.clone(), applied);
            }
        }
        self.versions.insert(key, version);
        Ok(())
    }

    /// The local copy of an entity, if any updates have arrived for it.
    pub fn get(&self, entity: &str, id: &str) -> Option<&Value> {
        self.entities.get(&EntityKey::new(entity, id))
    }

    /// The last fully-applied version; 0 when the entity is unknown.
    pub fn version(&self, entity: &str, id: &str) -> u64 {
        self.versions
            .get(&EntityKey::new(entity, id))
            .copied()
            .unwrap_or(0)
    }

    /// Content hash of the local copy, hex-encoded for reconnect claims.
    pub fn entity_hash(&self, entity: &str, id: &str) -> Option<String> {
        self.get(entity, id)
            .map(|state| hash_hex(content_hash(state)))
    }

    /// Drops an entity (reconnect said `deleted`).
    pub fn remove(&mut self, entity: &str, id: &str) {
        let key = EntityKey::new(entity, id);
        self.entities.remove(&key);
        self.versions.remove(&key);
    }

    /// Keys of every mirrored entity.
    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.entities.keys()
    }

    pub(crate) fn entry(&mut self, key: &EntityKey) -> &mut Value {
        self.entities
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()))
    }

    pub(crate) fn set_version(&mut self, key: &EntityKey, version: u64) {
        self.versions.insert(key.clone(), version);
    }
}

/// Mirror of one operation's result document, updated by `ops` events.
#[derive(Debug, Default)]
pub struct OperationMirror {
    doc: Value,
}

impl OperationMirror {
    /// Starts with a null document.
    pub fn new() -> Self {
        Self { doc: Value::Null }
    }

    /// Replaces the document with a fresh snapshot.
    pub fn apply_snapshot(&mut self, data: Value) {
        self.doc = data;
    }

    /// Applies incremental commands in order.
    pub fn apply_ops(&mut self, commands: &[EmitCommand]) -> Result<(), ClientError> {
        for command in commands {
            self.doc = apply_emit_command(&self.doc, command)?;
        }
        Ok(())
    }

    /// The current document.
    pub fn doc(&self) -> &Value {
        &self.doc
    }
}
