//! The graph state manager.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use lens_codec::{ArrayDiff, ArrayDiffOp, PatchOp, Update, compute_array_diff, create_update,
    diff_objects};
use lens_command::{ArrayCommand, CommandError, CommandSink, EmitCommand, FieldUpdate,
    apply_emit_command};
use lens_oplog::{LogConfig, LogEntry, LogStats, OperationLog};
use lens_value::{EntityKey, Map, Value, content_hash, map_hash, slice_hash};
use lens_wire::{CompressionConfig, ServerMessage};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::shadow::{ClientRecord, ShadowEntry};
use crate::{FieldSet, StateError};

/// Unique identifier for a connected client within a server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Error raised by a transport's send callback. Treated as a client-level
/// failure: the client is evicted and emission to others continues.
#[derive(Debug, thiserror::Error)]
#[error("transport send failed: {0}")]
pub struct SendError(pub String);

/// Ordered delivery callback for one client. May block on transport I/O,
/// so it is never invoked while the state lock is held.
pub type SendFn = Arc<dyn Fn(ClientId, &ServerMessage) -> Result<(), SendError> + Send + Sync>;

/// What happens to canonical state when the last subscriber leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep the entity as a warm cache indefinitely (default).
    Retain,
    /// Drop canonical state, version, hashes, and log entries immediately.
    Evict,
    /// Keep the entity for this long after the last unsubscribe, then drop
    /// it on the next [`GraphStateManager::sweep_expired`] call.
    Ttl(Duration),
}

/// Tunables for the manager.
#[derive(Debug, Clone)]
pub struct StatePolicy {
    /// Retention of unsubscribed entities.
    pub retention: RetentionPolicy,
    /// Operation log bounds.
    pub log: LogConfig,
    /// Reconnect snapshot compression.
    pub compression: CompressionConfig,
}

impl Default for StatePolicy {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::Retain,
            log: LogConfig::default(),
            compression: CompressionConfig::default(),
        }
    }
}

/// Counters reported by [`GraphStateManager::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateStats {
    /// Object entities with canonical state.
    pub entities: usize,
    /// Array entities with canonical state.
    pub arrays: usize,
    /// Connected clients.
    pub clients: usize,
    /// Total (client, entity) subscriptions.
    pub subscriptions: usize,
    /// Operation log counters.
    pub log: LogStats,
}

/// Callback invoked when an entity loses its last subscriber. Runs with
/// the internal lock held; it must not call back into the manager.
pub type UnsubscribedHook = Arc<dyn Fn(&EntityKey) + Send + Sync>;

pub(crate) struct ManagerInner {
    pub(crate) canonical: FxHashMap<EntityKey, Map<String, Value>>,
    pub(crate) canonical_arrays: FxHashMap<EntityKey, Vec<Value>>,
    pub(crate) versions: FxHashMap<EntityKey, u64>,
    pub(crate) field_hashes: FxHashMap<EntityKey, FxHashMap<String, u64>>,
    pub(crate) subscribers: FxHashMap<EntityKey, FxHashSet<ClientId>>,
    pub(crate) clients: FxHashMap<ClientId, ClientRecord>,
    pub(crate) log: OperationLog,
    idle_since: FxHashMap<EntityKey, Instant>,
}

/// A payload snapshotted under the lock, dispatched after release.
struct Outbound {
    client: ClientId,
    send: SendFn,
    message: ServerMessage,
}

/// Owns canonical state and everything derived from it.
pub struct GraphStateManager {
    inner: Mutex<ManagerInner>,
    /// Taken before the state lock is released so wire updates leave in
    /// version order even when emits race on different entities' dispatch.
    send_order: Mutex<()>,
    pub(crate) policy: StatePolicy,
    on_entity_unsubscribed: Option<UnsubscribedHook>,
}

impl GraphStateManager {
    /// Creates a manager with the given policy.
    pub fn new(policy: StatePolicy) -> Self {
        Self {
            inner: Mutex::new(ManagerInner {
                canonical: FxHashMap::default(),
                canonical_arrays: FxHashMap::default(),
                versions: FxHashMap::default(),
                field_hashes: FxHashMap::default(),
                subscribers: FxHashMap::default(),
                clients: FxHashMap::default(),
                log: OperationLog::new(policy.log.clone()),
                idle_since: FxHashMap::default(),
            }),
            send_order: Mutex::new(()),
            policy,
            on_entity_unsubscribed: None,
        }
    }

    /// Installs a hook fired when an entity loses its last subscriber.
    pub fn on_entity_unsubscribed(mut self, hook: UnsubscribedHook) -> Self {
        self.on_entity_unsubscribed = Some(hook);
        self
    }

    // -----------------------------------------------------------------
    // Client lifecycle
    // -----------------------------------------------------------------

    /// Registers a client. Adding an id that already exists is a replace:
    /// the new send callback wins, and the old record's shadows and
    /// subscriptions are discarded (the old transport is presumed dead).
    pub fn add_client(&self, client: ClientId, send: SendFn) {
        let mut inner = self.lock();
        if inner.clients.insert(client, ClientRecord::new(send)).is_some() {
            tracing::debug!(%client, "replacing existing client record");
            self.purge_subscriptions(&mut inner, client);
        }
    }

    /// Removes a client and every reference to it. Idempotent.
    pub fn remove_client(&self, client: ClientId) {
        let mut inner = self.lock();
        if inner.clients.remove(&client).is_none() {
            return;
        }
        tracing::debug!(%client, "client removed");
        self.purge_subscriptions(&mut inner, client);
    }

    fn purge_subscriptions(&self, inner: &mut ManagerInner, client: ClientId) {
        let mut emptied = Vec::new();
        inner.subscribers.retain(|key, set| {
            set.remove(&client);
            if set.is_empty() {
                emptied.push(key.clone());
                false
            } else {
                true
            }
        });
        for key in emptied {
            self.handle_entity_idle(inner, &key);
        }
    }

    // -----------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------

    /// Subscribes `client` to an entity. If canonical state already
    /// exists, the client is immediately hydrated with every subscribed
    /// field carried as a whole value.
    pub fn subscribe(
        &self,
        client: ClientId,
        entity: &str,
        id: &str,
        fields: FieldSet,
    ) -> Result<(), StateError> {
        let key = EntityKey::new(entity, id);
        let mut outbox = Vec::new();
        let mut inner = self.lock();
        let inner_ref = &mut *inner;
        if !inner_ref.clients.contains_key(&client) {
            return Err(StateError::UnknownClient(client));
        }
        inner_ref
            .subscribers
            .entry(key.clone())
            .or_default()
            .insert(client);
        inner_ref.idle_since.remove(&key);

        let version = inner_ref.versions.get(&key).copied().unwrap_or(0);
        let Some(record) = inner_ref.clients.get_mut(&client) else {
            return Err(StateError::UnknownClient(client));
        };
        let shadow = record
            .shadows
            .entry(key.clone())
            .or_insert_with(|| ShadowEntry::new(fields.clone()));
        shadow.fields = fields;

        if let Some(canonical) = inner_ref.canonical.get(&key) {
            if version > 0 {
                let mut updates = BTreeMap::new();
                for (name, value) in canonical {
                    if !shadow.fields.contains(name) {
                        continue;
                    }
                    updates.insert(name.clone(), Update::Value(value.clone()));
                    shadow.last_state.insert(name.clone(), value.clone());
                }
                if !updates.is_empty() {
                    outbox.push(Outbound {
                        client,
                        send: record.send.clone(),
                        message: ServerMessage::Update {
                            entity: entity.to_string(),
                            id: id.to_string(),
                            version,
                            updates,
                        },
                    });
                }
            }
        } else if let Some(items) = inner_ref.canonical_arrays.get(&key) {
            if version > 0 && shadow.fields.contains(ARRAY_FIELD) {
                record.array_shadows.insert(key.clone(), items.clone());
                let mut updates = BTreeMap::new();
                updates.insert(
                    ARRAY_FIELD.to_string(),
                    Update::Value(Value::Array(items.clone())),
                );
                outbox.push(Outbound {
                    client,
                    send: record.send.clone(),
                    message: ServerMessage::Update {
                        entity: entity.to_string(),
                        id: id.to_string(),
                        version,
                        updates,
                    },
                });
            }
        }

        self.dispatch(inner, outbox);
        Ok(())
    }

    /// Removes the subscription. A no-op for unknown pairs. When the
    /// entity's subscriber set becomes empty, the retention policy and the
    /// unsubscribed hook run.
    pub fn unsubscribe(&self, client: ClientId, entity: &str, id: &str) {
        let key = EntityKey::new(entity, id);
        let mut inner = self.lock();
        if let Some(record) = inner.clients.get_mut(&client) {
            record.shadows.remove(&key);
            record.array_shadows.remove(&key);
        }
        let now_empty = match inner.subscribers.get_mut(&key) {
            Some(set) => {
                set.remove(&client);
                set.is_empty()
            }
            None => false,
        };
        if now_empty {
            inner.subscribers.remove(&key);
            self.handle_entity_idle(&mut inner, &key);
        }
    }

    /// Replaces the field set for an existing subscription. No catch-up is
    /// sent; the next emit honors the new set.
    pub fn update_subscription(&self, client: ClientId, entity: &str, id: &str, fields: FieldSet) {
        let key = EntityKey::new(entity, id);
        let mut inner = self.lock();
        if let Some(shadow) = inner
            .clients
            .get_mut(&client)
            .and_then(|record| record.shadows.get_mut(&key))
        {
            shadow.fields = fields;
        }
    }

    fn handle_entity_idle(&self, inner: &mut ManagerInner, key: &EntityKey) {
        if let Some(hook) = &self.on_entity_unsubscribed {
            hook(key);
        }
        match self.policy.retention {
            RetentionPolicy::Retain => {}
            RetentionPolicy::Evict => inner.drop_entity(key),
            RetentionPolicy::Ttl(_) => {
                inner.idle_since.insert(key.clone(), Instant::now());
            }
        }
    }

    /// With TTL retention, drops entities whose last subscriber left
    /// longer than the TTL ago. A no-op under other policies.
    pub fn sweep_expired(&self) {
        let RetentionPolicy::Ttl(ttl) = self.policy.retention else {
            return;
        };
        let mut inner = self.lock();
        let expired: Vec<EntityKey> = inner
            .idle_since
            .iter()
            .filter(|(key, since)| {
                since.elapsed() > ttl && !inner.subscribers.contains_key(*key)
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            tracing::debug!(key = %key, "retention TTL expired; dropping entity");
            inner.drop_entity(&key);
        }
    }

    // -----------------------------------------------------------------
    // Emits
    // -----------------------------------------------------------------

    /// Merges (or replaces) `data` into canonical state. Structurally
    /// unchanged state is a complete no-op: no version bump, no log entry,
    /// no sends.
    pub fn emit(
        &self,
        entity: &str,
        id: &str,
        data: Value,
        replace: bool,
    ) -> Result<(), StateError> {
        let Value::Object(incoming) = data else {
            return Err(StateError::NotAnObject {
                entity: entity.to_string(),
                id: id.to_string(),
            });
        };
        let key = EntityKey::new(entity, id);
        let mut outbox = Vec::new();
        let mut inner = self.lock();

        let old = inner.canonical.get(&key).cloned().unwrap_or_default();
        let new = if replace {
            incoming
        } else {
            let mut merged = old.clone();
            for (name, value) in incoming {
                merged.insert(name, value);
            }
            merged
        };
        if map_hash(&old) == map_hash(&new) {
            return Ok(());
        }
        inner.commit_object(&key, entity, id, &old, new, &mut outbox);
        self.dispatch(inner, outbox);
        Ok(())
    }

    /// Applies `update` to one field (dotted paths allowed). Skips
    /// entirely when the field's content hash is unchanged. Creates the
    /// entity if it does not exist yet.
    pub fn emit_field(
        &self,
        entity: &str,
        id: &str,
        field: &str,
        update: Update,
    ) -> Result<(), StateError> {
        let command = EmitCommand::Field {
            field: field.to_string(),
            update,
        };
        let root = field.split('.').next().unwrap_or(field).to_string();
        self.commit_via_command(entity, id, command, Some(root))
    }

    /// Applies several field updates atomically: one version bump, one log
    /// entry, at most one send per affected client.
    pub fn emit_batch(
        &self,
        entity: &str,
        id: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<(), StateError> {
        self.commit_via_command(entity, id, EmitCommand::Batch { updates }, None)
    }

    /// Replaces the canonical array for an array-shaped entity.
    pub fn emit_array(&self, entity: &str, id: &str, items: Vec<Value>) -> Result<(), StateError> {
        let key = EntityKey::new(entity, id);
        let mut outbox = Vec::new();
        let mut inner = self.lock();
        let old = inner.canonical_arrays.get(&key).cloned().unwrap_or_default();
        if slice_hash(&old) == slice_hash(&items) {
            return Ok(());
        }
        inner.commit_array(&key, entity, id, &old, items, &mut outbox);
        self.dispatch(inner, outbox);
        Ok(())
    }

    /// Applies one array operation to an array-shaped entity.
    pub fn emit_array_op(&self, entity: &str, id: &str, op: ArrayCommand) -> Result<(), StateError> {
        let key = EntityKey::new(entity, id);
        let mut outbox = Vec::new();
        let mut inner = self.lock();
        let old = inner.canonical_arrays.get(&key).cloned().unwrap_or_default();
        let applied = apply_emit_command(
            &Value::Array(old.clone()),
            &EmitCommand::Array { op, field: None },
        )?;
        let Value::Array(new) = applied else {
            return Ok(());
        };
        if slice_hash(&old) == slice_hash(&new) {
            return Ok(());
        }
        inner.commit_array(&key, entity, id, &old, new, &mut outbox);
        self.dispatch(inner, outbox);
        Ok(())
    }

    /// Dispatches on the command tag.
    pub fn process_command(
        &self,
        entity: &str,
        id: &str,
        command: EmitCommand,
    ) -> Result<(), StateError> {
        match command {
            EmitCommand::Full { data, replace } => self.emit(entity, id, data, replace),
            EmitCommand::Field { field, update } => self.emit_field(entity, id, &field, update),
            EmitCommand::Batch { updates } => self.emit_batch(entity, id, updates),
            EmitCommand::Array { op, field: None } => self.emit_array_op(entity, id, op),
            command @ EmitCommand::Array { field: Some(_), .. } => {
                self.commit_via_command(entity, id, command, None)
            }
        }
    }

    /// Shared object-entity commit path: applies `command` to canonical,
    /// short-circuits on unchanged content, then versions, logs, and fans
    /// out. `hash_gate_field` enables the per-field hash shortcut.
    fn commit_via_command(
        &self,
        entity: &str,
        id: &str,
        command: EmitCommand,
        hash_gate_field: Option<String>,
    ) -> Result<(), StateError> {
        let key = EntityKey::new(entity, id);
        let mut outbox = Vec::new();
        let mut inner = self.lock();

        let old = inner.canonical.get(&key).cloned().unwrap_or_default();
        let applied = apply_emit_command(&Value::Object(old.clone()), &command)?;
        let Value::Object(new) = applied else {
            return Err(StateError::NotAnObject {
                entity: entity.to_string(),
                id: id.to_string(),
            });
        };

        if let Some(root) = &hash_gate_field {
            let new_hash = new.get(root).map(content_hash).unwrap_or_else(|| content_hash(&Value::Null));
            let cached = inner
                .field_hashes
                .get(&key)
                .and_then(|hashes| hashes.get(root))
                .copied();
            if cached == Some(new_hash) {
                return Ok(());
            }
        }
        if map_hash(&old) == map_hash(&new) {
            return Ok(());
        }

        inner.commit_object(&key, entity, id, &old, new, &mut outbox);
        self.dispatch(inner, outbox);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    /// The entity's current version; 0 means "never emitted".
    pub fn get_version(&self, entity: &str, id: &str) -> u64 {
        let key = EntityKey::new(entity, id);
        self.lock().versions.get(&key).copied().unwrap_or(0)
    }

    /// A copy of the canonical state: an object for object entities, an
    /// array for array entities, `None` when absent.
    pub fn canonical_state(&self, entity: &str, id: &str) -> Option<Value> {
        let key = EntityKey::new(entity, id);
        let inner = self.lock();
        if let Some(map) = inner.canonical.get(&key) {
            return Some(Value::Object(map.clone()));
        }
        inner
            .canonical_arrays
            .get(&key)
            .map(|items| Value::Array(items.clone()))
    }

    /// Current counters.
    pub fn stats(&self) -> StateStats {
        let inner = self.lock();
        StateStats {
            entities: inner.canonical.len(),
            arrays: inner.canonical_arrays.len(),
            clients: inner.clients.len(),
            subscriptions: inner.subscribers.values().map(|set| set.len()).sum(),
            log: inner.log.stats(),
        }
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    pub(crate) fn lock(&self) -> MutexGuard<'_, ManagerInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Releases the state lock and delivers the snapshotted payloads.
    /// Failed sends evict the affected client after delivery finishes.
    fn dispatch(&self, inner: MutexGuard<'_, ManagerInner>, outbox: Vec<Outbound>) {
        if outbox.is_empty() {
            return;
        }
        let order = match self.send_order.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        drop(inner);

        let mut failed = Vec::new();
        for outbound in outbox {
            if let Err(error) = (outbound.send)(outbound.client, &outbound.message) {
                tracing::warn!(client = %outbound.client, %error, "send failed; evicting client");
                failed.push(outbound.client);
            }
        }
        drop(order);

        for client in failed {
            self.remove_client(client);
        }
    }
}

impl CommandSink for GraphStateManager {
    fn process(&self, entity: &str, id: &str, command: EmitCommand) -> Result<(), CommandError> {
        self.process_command(entity, id, command).map_err(|error| match error {
            StateError::Command(inner) => inner,
            other => CommandError::Sink(other.to_string()),
        })
    }
}

/// Synthetic field name under which array entities travel on the wire and
/// in the operation log.
pub(crate) const ARRAY_FIELD: &str = "_items";

impl ManagerInner {
    /// Commits a changed object state: bump, log, hash refresh, fan-out.
    /// Canonical is written before any fan-out work begins.
    fn commit_object(
        &mut self,
        key: &EntityKey,
        entity: &str,
        id: &str,
        old: &Map<String, Value>,
        new: Map<String, Value>,
        outbox: &mut Vec<Outbound>,
    ) {
        let slot = self.versions.entry(key.clone()).or_insert(0);
        *slot += 1;
        let version = *slot;

        let patch = diff_objects(old, &new);
        self.log.append(key.clone(), LogEntry::new(version, now_ms(), patch));

        let hashes = self.field_hashes.entry(key.clone()).or_default();
        hashes.clear();
        for (name, value) in &new {
            hashes.insert(name.clone(), content_hash(value));
        }

        self.canonical.insert(key.clone(), new);
        self.fanout_object(key, entity, id, version, outbox);
    }

    /// Commits a changed array state.
    fn commit_array(
        &mut self,
        key: &EntityKey,
        entity: &str,
        id: &str,
        old: &[Value],
        new: Vec<Value>,
        outbox: &mut Vec<Outbound>,
    ) {
        let slot = self.versions.entry(key.clone()).or_insert(0);
        *slot += 1;
        let version = *slot;

        let patch = match compute_array_diff(old, &new) {
            ArrayDiff::Replace => vec![PatchOp::Replace {
                path: format!("/{ARRAY_FIELD}"),
                value: Value::Array(new.clone()),
            }],
            ArrayDiff::Ops(ops) => ops.iter().map(array_op_to_patch).collect(),
        };
        self.log.append(key.clone(), LogEntry::new(version, now_ms(), patch));

        self.canonical_arrays.insert(key.clone(), new);
        self.fanout_array(key, entity, id, version, outbox);
    }

    fn fanout_object(
        &mut self,
        key: &EntityKey,
        entity: &str,
        id: &str,
        version: u64,
        outbox: &mut Vec<Outbound>,
    ) {
        let Some(subscribers) = self.subscribers.get(key) else {
            return;
        };
        let Some(canonical) = self.canonical.get(key) else {
            return;
        };
        for &client in subscribers {
            let Some(record) = self.clients.get_mut(&client) else {
                continue;
            };
            let Some(shadow) = record.shadows.get_mut(key) else {
                continue;
            };

            let field_names: Vec<String> = match &shadow.fields {
                FieldSet::All => {
                    let mut names: Vec<String> = canonical.keys().cloned().collect();
                    for name in shadow.last_state.keys() {
                        if !canonical.contains_key(name) {
                            names.push(name.clone());
                        }
                    }
                    names
                }
                FieldSet::Named(names) => names.iter().cloned().collect(),
            };

            let mut updates = BTreeMap::new();
            for name in field_names {
                let old_value = shadow.last_state.get(&name).unwrap_or(&Value::Null);
                let new_value = canonical.get(&name).unwrap_or(&Value::Null);
                if old_value == new_value {
                    continue;
                }
                updates.insert(name.clone(), create_update(old_value, new_value));
            }
            if updates.is_empty() {
                continue;
            }
            for name in updates.keys() {
                match canonical.get(name) {
                    Some(value) => {
                        shadow.last_state.insert(name.clone(), value.clone());
                    }
                    None => {
                        shadow.last_state.remove(name);
                    }
                }
            }
            outbox.push(Outbound {
                client,
                send: record.send.clone(),
                message: ServerMessage::Update {
                    entity: entity.to_string(),
                    id: id.to_string(),
                    version,
                    updates,
                },
            });
        }
    }

    fn fanout_array(
        &mut self,
        key: &EntityKey,
        entity: &str,
        id: &str,
        version: u64,
        outbox: &mut Vec<Outbound>,
    ) {
        let Some(subscribers) = self.subscribers.get(key) else {
            return;
        };
        let Some(current) = self.canonical_arrays.get(key) else {
            return;
        };
        for &client in subscribers {
            let Some(record) = self.clients.get_mut(&client) else {
                continue;
            };
            let covered = record
                .shadows
                .get(key)
                .is_some_and(|shadow| shadow.fields.contains(ARRAY_FIELD));
            if !covered {
                continue;
            }
            let shadow_items = record.array_shadows.entry(key.clone()).or_default();
            let update = match compute_array_diff(shadow_items, current) {
                ArrayDiff::Ops(ops) if ops.is_empty() => continue,
                ArrayDiff::Ops(ops) => Update::Array(ops),
                ArrayDiff::Replace => Update::Value(Value::Array(current.clone())),
            };
            *shadow_items = current.clone();

            let mut updates = BTreeMap::new();
            updates.insert(ARRAY_FIELD.to_string(), update);
            outbox.push(Outbound {
                client,
                send: record.send.clone(),
                message: ServerMessage::Update {
                    entity: entity.to_string(),
                    id: id.to_string(),
                    version,
                    updates,
                },
            });
        }
    }

    /// Drops every trace of an entity (retention eviction).
    fn drop_entity(&mut self, key: &EntityKey) {
        self.canonical.remove(key);
        self.canonical_arrays.remove(key);
        self.versions.remove(key);
        self.field_hashes.remove(key);
        self.idle_since.remove(key);
        self.log.remove_key(key);
    }
}

fn array_op_to_patch(op: &ArrayDiffOp) -> PatchOp {
    match op {
        ArrayDiffOp::Insert { index, value } => PatchOp::Add {
            path: format!("/{ARRAY_FIELD}/{index}"),
            value: value.clone(),
        },
        ArrayDiffOp::Replace { index, value } => PatchOp::Replace {
            path: format!("/{ARRAY_FIELD}/{index}"),
            value: value.clone(),
        },
        ArrayDiffOp::Remove { index } => PatchOp::Remove {
            path: format!("/{ARRAY_FIELD}/{index}"),
        },
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
