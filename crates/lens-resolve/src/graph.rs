//! The resolution walk.

use lens_value::{Map, Value, map_hash};
use rustc_hash::FxHashSet;

use crate::registry::{BatchResolveFn, FieldResolveFn, SubscribeFn};
use crate::{FieldKind, Loader, ResolveConfig, ResolveError, SchemaRegistry, discover_type};

/// A live field encountered during the walk: its dotted path from the
/// operation result root, and the publisher to start.
pub struct LiveRegistration {
    /// Dotted path (array hops contribute indices): `"comments.0.status"`.
    pub path: String,
    /// Publisher start function.
    pub subscribe: SubscribeFn,
}

/// Result of [`resolve_graph`].
pub struct ResolvedGraph {
    /// The value with every resolver-computed field filled in.
    pub value: Value,
    /// Live registrations, in discovery order.
    pub live: Vec<LiveRegistration>,
}

#[derive(Debug, Clone, PartialEq)]
enum PathSeg {
    Key(String),
    Index(usize),
}

/// Walks `root`, resolving every entity-typed subtree.
///
/// Resolution proceeds in rounds: all entities currently known resolve
/// their fields (batched per `(type, field)` through `loader`), results
/// are written back, and any entities discovered inside those results form
/// the next round. A `type:id` visited set cuts off cycles. A failing
/// resolver collapses its one field to null and the walk continues.
pub async fn resolve_graph(
    root: Value,
    registry: &SchemaRegistry,
    config: &ResolveConfig,
    loader: &mut Loader,
) -> Result<ResolvedGraph, ResolveError> {
    let mut value = root;
    let mut live = Vec::new();
    let mut visited: FxHashSet<String> = FxHashSet::default();
    let mut frontier: Vec<(Vec<PathSeg>, String)> = Vec::new();
    scan_value(
        &value,
        &mut Vec::new(),
        registry,
        config,
        &mut visited,
        &mut frontier,
    );

    let mut rounds = 0;
    while !frontier.is_empty() {
        rounds += 1;
        if rounds > config.max_depth {
            return Err(ResolveError::DepthExceeded {
                max: config.max_depth,
            });
        }

        // All (entity, field) requests of this round, then grouped by
        // (type, field) so the loader can batch across parents.
        let mut requests: Vec<(Vec<PathSeg>, String, String)> = Vec::new();
        for (path, type_name) in &frontier {
            let Some(def) = registry.get(type_name) else {
                continue;
            };
            for (field_name, kind) in def.fields() {
                match kind {
                    FieldKind::Expose => {}
                    FieldKind::Resolve { .. } => {
                        requests.push((path.clone(), type_name.clone(), field_name.clone()));
                    }
                    FieldKind::Live { subscribe, .. } => {
                        requests.push((path.clone(), type_name.clone(), field_name.clone()));
                        let mut live_path = path.clone();
                        live_path.push(PathSeg::Key(field_name.clone()));
                        live.push(LiveRegistration {
                            path: dotted(&live_path),
                            subscribe: subscribe.clone(),
                        });
                    }
                }
            }
        }

        let mut groups: Vec<((String, String), Vec<usize>)> = Vec::new();
        for (index, (_, type_name, field)) in requests.iter().enumerate() {
            match groups
                .iter_mut()
                .find(|((t, f), _)| t == type_name && f == field)
            {
                Some((_, members)) => members.push(index),
                None => groups.push(((type_name.clone(), field.clone()), vec![index])),
            }
        }

        let mut written: Vec<Vec<PathSeg>> = Vec::new();
        for ((type_name, field), members) in groups {
            let Some((resolve, batch)) = field_fns(registry, &type_name, &field) else {
                continue;
            };
            let parents: Vec<(usize, Value)> = members
                .iter()
                .enumerate()
                .map(|(slot, &request)| {
                    let parent = get_at(&value, &requests[request].0)
                        .cloned()
                        .unwrap_or(Value::Null);
                    (slot, parent)
                })
                .collect();

            let results = loader
                .load_field(&type_name, &field, &resolve, batch.as_ref(), parents)
                .await;
            for (slot, result) in results {
                let request = members[slot];
                let mut target = requests[request].0.clone();
                target.push(PathSeg::Key(field.clone()));
                let field_value = match result {
                    Ok(resolved) => resolved,
                    Err(error) => {
                        // Per-field isolation: this field collapses to
                        // null, siblings are unaffected.
                        tracing::warn!(
                            type_name = %type_name,
                            field = %field,
                            %error,
                            "field resolver failed"
                        );
                        Value::Null
                    }
                };
                if set_at(&mut value, &target, field_value) {
                    written.push(target);
                }
            }
        }

        frontier.clear();
        for path in &written {
            if let Some(subtree) = get_at(&value, path) {
                let mut base = path.clone();
                scan_value(
                    subtree,
                    &mut base,
                    registry,
                    config,
                    &mut visited,
                    &mut frontier,
                );
            }
        }
    }

    Ok(ResolvedGraph { value, live })
}

fn field_fns(
    registry: &SchemaRegistry,
    type_name: &str,
    field: &str,
) -> Option<(FieldResolveFn, Option<BatchResolveFn>)> {
    let def = registry.get(type_name)?;
    let (_, kind) = def.fields().iter().find(|(name, _)| name == field)?;
    match kind {
        FieldKind::Resolve { resolve, batch } => Some((resolve.clone(), batch.clone())),
        FieldKind::Live { resolve, .. } => Some((resolve.clone(), None)),
        FieldKind::Expose => None,
    }
}

fn scan_value(
    value: &Value,
    path: &mut Vec<PathSeg>,
    registry: &SchemaRegistry,
    config: &ResolveConfig,
    visited: &mut FxHashSet<String>,
    frontier: &mut Vec<(Vec<PathSeg>, String)>,
) {
    match value {
        Value::Object(map) => {
            if let Some(def) = discover_type(registry, map, config) {
                if !visited.insert(entity_marker(def.name(), map)) {
                    // Cycle cut-off: this entity is already being (or has
                    // been) resolved; do not re-enter.
                    return;
                }
                frontier.push((path.clone(), def.name().to_string()));
            }
            for (name, field) in map {
                path.push(PathSeg::Key(name.clone()));
                scan_value(field, path, registry, config, visited, frontier);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(PathSeg::Index(index));
                scan_value(item, path, registry, config, visited, frontier);
                path.pop();
            }
        }
        _ => {}
    }
}

fn entity_marker(type_name: &str, map: &Map<String, Value>) -> String {
    match map.get("id") {
        Some(Value::String(id)) => format!("{type_name}:{id}"),
        Some(Value::Number(id)) => format!("{type_name}:{id}"),
        // Anonymous entities are keyed by content so distinct instances
        // still resolve while identical re-occurrences terminate.
        _ => format!("{type_name}:@{:016x}", map_hash(map)),
    }
}

fn dotted(path: &[PathSeg]) -> String {
    path.iter()
        .map(|seg| match seg {
            PathSeg::Key(key) => key.clone(),
            PathSeg::Index(index) => index.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn get_at<'a>(root: &'a Value, path: &[PathSeg]) -> Option<&'a Value> {
    let mut cur = root;
    for seg in path {
        cur = match seg {
            PathSeg::Key(key) => match cur {
                Value::Object(map) => map.get(key)?,
                _ => return None,
            },
            PathSeg::Index(index) => match cur {
                Value::Array(items) => items.get(*index)?,
                _ => return None,
            },
        };
    }
    Some(cur)
}

fn set_at(root: &mut Value, path: &[PathSeg], new: Value) -> bool {
    let Some((last, parents)) = path.split_last() else {
        *root = new;
        return true;
    };
    let mut cur = root;
    for seg in parents {
        cur = match seg {
            PathSeg::Key(key) => match cur {
                Value::Object(map) => match map.get_mut(key) {
                    Some(next) => next,
                    None => return false,
                },
                _ => return false,
            },
            PathSeg::Index(index) => match cur {
                Value::Array(items) => match items.get_mut(*index) {
                    Some(next) => next,
                    None => return false,
                },
                _ => return false,
            },
        };
    }
    match last {
        PathSeg::Key(key) => match cur {
            Value::Object(map) => {
                map.insert(key.clone(), new);
                true
            }
            _ => false,
        },
        PathSeg::Index(index) => match cur {
            Value::Array(items) => match items.get_mut(*index) {
                Some(slot) => {
                    *slot = new;
                    true
                }
                None => false,
            },
            _ => false,
        },
    }
}
