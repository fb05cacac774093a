//! Per-request field loader.
//!
//! One loader lives for the duration of one operation call. It batches
//! same-field resolution across parents discovered in the same pass and
//! caches results keyed `(type, field, entity-id)` so an entity reachable
//! through several paths resolves once.

use lens_value::Value;
use rustc_hash::FxHashMap;

use crate::registry::{BatchResolveFn, FieldResolveFn};
use crate::ResolveError;

/// Per-request loader table. Constructed fresh per operation and released
/// at operation end.
#[derive(Default)]
pub struct Loader {
    cache: FxHashMap<(String, String, String), Value>,
}

impl Loader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `field` for every parent in `parents` (`(slot, parent)`
    /// pairs; slots are echoed back with the results).
    ///
    /// With more than one uncached parent and a batch fan-in available,
    /// the batch runs once; otherwise parents resolve one by one.
    pub(crate) async fn load_field(
        &mut self,
        type_name: &str,
        field: &str,
        resolve: &FieldResolveFn,
        batch: Option<&BatchResolveFn>,
        parents: Vec<(usize, Value)>,
    ) -> Vec<(usize, Result<Value, ResolveError>)> {
        let mut out = Vec::with_capacity(parents.len());
        let mut pending: Vec<(usize, Option<String>, Value)> = Vec::new();

        for (slot, parent) in parents {
            let id = parent_id(&parent);
            if let Some(id) = &id {
                let key = (type_name.to_string(), field.to_string(), id.clone());
                if let Some(hit) = self.cache.get(&key) {
                    out.push((slot, Ok(hit.clone())));
                    continue;
                }
            }
            pending.push((slot, id, parent));
        }
        if pending.is_empty() {
            return out;
        }

        match batch {
            Some(batch_fn) if pending.len() > 1 => {
                let values: Vec<Value> = pending.iter().map(|(_, _, p)| p.clone()).collect();
                match batch_fn(values).await {
                    Ok(results) if results.len() == pending.len() => {
                        for ((slot, id, _), value) in pending.into_iter().zip(results) {
                            self.remember(type_name, field, id, &value);
                            out.push((slot, Ok(value)));
                        }
                    }
                    Ok(results) => {
                        let error = ResolveError::BatchShape {
                            type_name: type_name.to_string(),
                            field: field.to_string(),
                            expected: pending.len(),
                            got: results.len(),
                        };
                        for (slot, _, _) in pending {
                            out.push((slot, Err(error.clone())));
                        }
                    }
                    Err(error) => {
                        for (slot, _, _) in pending {
                            out.push((slot, Err(error.clone())));
                        }
                    }
                }
            }
            _ => {
                for (slot, id, parent) in pending {
                    let result = resolve(parent).await;
                    if let Ok(value) = &result {
                        self.remember(type_name, field, id, value);
                    }
                    out.push((slot, result));
                }
            }
        }
        out
    }

    fn remember(&mut self, type_name: &str, field: &str, id: Option<String>, value: &Value) {
        if let Some(id) = id {
            self.cache
                .insert((type_name.to_string(), field.to_string(), id), value.clone());
        }
    }
}

fn parent_id(parent: &Value) -> Option<String> {
    match parent.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
