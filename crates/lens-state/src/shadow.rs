//! Per-client shadow state: what the server believes each client holds.

use lens_value::{EntityKey, Map, Value};
use rustc_hash::FxHashMap;

use crate::FieldSet;
use crate::manager::SendFn;

/// Shadow of one entity for one client.
#[derive(Debug, Clone)]
pub(crate) struct ShadowEntry {
    /// The exact field values last sent to (and acknowledged by the act of
    /// sending to) this client.
    pub(crate) last_state: Map<String, Value>,
    /// The subscription's field set.
    pub(crate) fields: FieldSet,
}

impl ShadowEntry {
    pub(crate) fn new(fields: FieldSet) -> Self {
        Self {
            last_state: Map::new(),
            fields,
        }
    }
}

/// One connected client as the manager sees it.
pub(crate) struct ClientRecord {
    /// Ordered, potentially blocking delivery callback.
    pub(crate) send: SendFn,
    /// Object-entity shadows keyed by entity.
    pub(crate) shadows: FxHashMap<EntityKey, ShadowEntry>,
    /// Array-entity shadows keyed by entity.
    pub(crate) array_shadows: FxHashMap<EntityKey, Vec<Value>>,
}

impl ClientRecord {
    pub(crate) fn new(send: SendFn) -> Self {
        Self {
            send,
            shadows: FxHashMap::default(),
            array_shadows: FxHashMap::default(),
        }
    }
}
