//! Bounded per-entity operation log.
//!
//! Every state-changing emit appends one `(version, patch)` entry. On
//! reconnect, `get_since` replays the patches that bring a stale client
//! current; if the needed range has been evicted the caller downgrades to
//! a full snapshot.
//!
//! Eviction is FIFO against one budget shared by all keys (entry count,
//! total patch bytes, max age, whichever binds first), so a noisy entity
//! cannot starve quiet ones: the oldest entry anywhere is always the first
//! to go.

use std::collections::VecDeque;
use std::time::Duration;

use lens_codec::{PatchOp, patch_byte_size};
use lens_value::EntityKey;
use rustc_hash::FxHashMap;

/// One logged state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Entity version immediately after this transition.
    pub version: u64,
    /// Wall-clock milliseconds when the transition happened.
    pub timestamp_ms: u64,
    /// The patch transforming version `version - 1` into `version`.
    pub patch: Vec<PatchOp>,
    /// Serialized size of `patch` in bytes.
    pub patch_size: usize,
}

impl LogEntry {
    /// Builds an entry, computing its byte size.
    pub fn new(version: u64, timestamp_ms: u64, patch: Vec<PatchOp>) -> Self {
        let patch_size = patch_byte_size(&patch);
        Self {
            version,
            timestamp_ms,
            patch,
            patch_size,
        }
    }
}

/// Bounds for the shared log budget.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Maximum retained entries across all keys. Default: 10 000.
    pub max_entries: usize,
    /// Maximum total patch bytes across all keys. Default: 4 MiB.
    pub max_bytes: usize,
    /// Maximum entry age. Default: 5 minutes.
    pub max_age: Duration,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_bytes: 4 * 1024 * 1024,
            max_age: Duration::from_secs(300),
        }
    }
}

/// Counters reported by [`OperationLog::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStats {
    /// Retained entries across all keys.
    pub entries: usize,
    /// Total patch bytes across all keys.
    pub bytes: usize,
    /// Number of keys with at least one retained entry.
    pub keys: usize,
}

#[derive(Debug)]
struct Sequenced {
    seq: u64,
    entry: LogEntry,
}

/// Append-only per-entity log with global FIFO eviction.
#[derive(Debug)]
pub struct OperationLog {
    config: LogConfig,
    entries: FxHashMap<EntityKey, VecDeque<Sequenced>>,
    /// Global append order: `(seq, key)`. May contain stale pairs for keys
    /// dropped via [`OperationLog::remove_key`]; they are skipped lazily.
    order: VecDeque<(u64, EntityKey)>,
    next_seq: u64,
    total_entries: usize,
    total_bytes: usize,
}

impl OperationLog {
    /// Creates an empty log with the given bounds.
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            entries: FxHashMap::default(),
            order: VecDeque::new(),
            next_seq: 0,
            total_entries: 0,
            total_bytes: 0,
        }
    }

    /// Appends an entry for `key`, then evicts until all bounds hold.
    ///
    /// The new entry's timestamp doubles as "now" for age-based eviction.
    pub fn append(&mut self, key: EntityKey, entry: LogEntry) {
        let now_ms = entry.timestamp_ms;
        let seq = self.next_seq;
        self.next_seq += 1;

        self.total_entries += 1;
        self.total_bytes += entry.patch_size;
        self.entries
            .entry(key.clone())
            .or_default()
            .push_back(Sequenced { seq, entry });
        self.order.push_back((seq, key));

        self.evict_expired(now_ms);
        while self.total_entries > self.config.max_entries
            || self.total_bytes > self.config.max_bytes
        {
            if !self.evict_oldest() {
                break;
            }
        }
    }

    /// Returns every entry for `key` with `version > from_version`, or
    /// `None` when part of that range has been evicted and the log can no
    /// longer serve it. Serveability check: the oldest retained entry for
    /// the key must have `version <= from_version + 1`.
    pub fn get_since(&self, key: &EntityKey, from_version: u64) -> Option<Vec<LogEntry>> {
        let deque = self.entries.get(key)?;
        let oldest = deque.front()?;
        if oldest.entry.version > from_version + 1 {
            return None;
        }
        Some(
            deque
                .iter()
                .filter(|sequenced| sequenced.entry.version > from_version)
                .map(|sequenced| sequenced.entry.clone())
                .collect(),
        )
    }

    /// Drops all entries for `key` (used when an entity is evicted by the
    /// retention policy). Order bookkeeping is cleaned up lazily.
    pub fn remove_key(&mut self, key: &EntityKey) {
        if let Some(deque) = self.entries.remove(key) {
            for sequenced in &deque {
                self.total_entries -= 1;
                self.total_bytes -= sequenced.entry.patch_size;
            }
        }
    }

    /// Evicts entries older than the configured max age, relative to `now_ms`.
    pub fn evict_expired(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.config.max_age.as_millis() as u64);
        while let Some(front) = self.oldest_entry() {
            if front.timestamp_ms >= cutoff {
                break;
            }
            self.evict_oldest();
        }
    }

    /// Current counters.
    pub fn stats(&self) -> LogStats {
        LogStats {
            entries: self.total_entries,
            bytes: self.total_bytes,
            keys: self.entries.len(),
        }
    }

    /// Peeks at the globally oldest retained entry, skipping stale order
    /// pairs left behind by [`OperationLog::remove_key`].
    fn oldest_entry(&mut self) -> Option<&LogEntry> {
        loop {
            let (seq, key) = self.order.front()?;
            let live = self
                .entries
                .get(key)
                .and_then(|deque| deque.front())
                .is_some_and(|front| front.seq == *seq);
            if live {
                let (_, key) = self.order.front()?;
                return self
                    .entries
                    .get(key)
                    .and_then(|deque| deque.front())
                    .map(|sequenced| &sequenced.entry);
            }
            self.order.pop_front();
        }
    }

    /// Evicts the globally oldest entry. Returns `false` when empty.
    fn evict_oldest(&mut self) -> bool {
        loop {
            let Some((seq, key)) = self.order.pop_front() else {
                return false;
            };
            let Some(deque) = self.entries.get_mut(&key) else {
                continue; // stale pair for a removed key
            };
            let matches = deque.front().is_some_and(|front| front.seq == seq);
            if !matches {
                continue;
            }
            if let Some(sequenced) = deque.pop_front() {
                self.total_entries -= 1;
                self.total_bytes -= sequenced.entry.patch_size;
                tracing::trace!(
                    key = %key,
                    version = sequenced.entry.version,
                    "evicted oplog entry"
                );
            }
            if deque.is_empty() {
                self.entries.remove(&key);
            }
            return true;
        }
    }
}
