//! JSON-Patch subset (`add` / `replace` / `remove`) used for object diffs
//! and the operation log.
//!
//! Pointers follow RFC 6901: `/field`, `/nested/field`, `/_items/3`, with
//! `~0`/`~1` escaping. Array hops accept numeric tokens and `-` (append,
//! `add` only).

use lens_value::Value;
use serde::{Deserialize, Serialize};

use crate::{CodecError, kind_name};

/// One patch operation against a value tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert (or overwrite) the value at `path`.
    Add {
        /// RFC 6901 pointer.
        path: String,
        /// Value to insert.
        value: Value,
    },
    /// Replace the value at `path`.
    Replace {
        /// RFC 6901 pointer.
        path: String,
        /// Replacement value.
        value: Value,
    },
    /// Remove the value at `path`.
    Remove {
        /// RFC 6901 pointer.
        path: String,
    },
}

impl PatchOp {
    /// The pointer this operation targets.
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Replace { path, .. } | PatchOp::Remove { path } => {
                path
            }
        }
    }
}

/// Computes the patch transforming `old` into `new`.
///
/// Objects diff recursively, field by field; arrays and scalars are
/// replaced whole (array granularity is the array strategy's job). Equal
/// inputs produce an empty patch.
pub fn diff(old: &Value, new: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_at(old, new, "", &mut ops);
    ops
}

/// Like [`diff`], for two field maps (the canonical-state representation).
pub fn diff_objects(
    old: &lens_value::Map<String, Value>,
    new: &lens_value::Map<String, Value>,
) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_maps(old, new, "", &mut ops);
    ops
}

fn diff_at(old: &Value, new: &Value, prefix: &str, ops: &mut Vec<PatchOp>) {
    if old == new {
        return;
    }
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => diff_maps(old_map, new_map, prefix, ops),
        _ => ops.push(PatchOp::Replace {
            path: prefix.to_string(),
            value: new.clone(),
        }),
    }
}

fn diff_maps(
    old_map: &lens_value::Map<String, Value>,
    new_map: &lens_value::Map<String, Value>,
    prefix: &str,
    ops: &mut Vec<PatchOp>,
) {
    for name in old_map.keys() {
        if !new_map.contains_key(name) {
            ops.push(PatchOp::Remove {
                path: join_pointer(prefix, name),
            });
        }
    }
    for (name, new_field) in new_map {
        match old_map.get(name) {
            None => ops.push(PatchOp::Add {
                path: join_pointer(prefix, name),
                value: new_field.clone(),
            }),
            Some(old_field) => diff_at(old_field, new_field, &join_pointer(prefix, name), ops),
        }
    }
}

/// Applies `ops` in order to a copy of `base` and returns the result.
pub fn apply_patch(base: &Value, ops: &[PatchOp]) -> Result<Value, CodecError> {
    let mut out = base.clone();
    for op in ops {
        apply_one(&mut out, op)?;
    }
    Ok(out)
}

/// Serialized size of a patch in bytes, used for log budget accounting.
pub fn patch_byte_size(ops: &[PatchOp]) -> usize {
    serde_json::to_vec(ops).map(|bytes| bytes.len()).unwrap_or_default()
}

fn apply_one(target: &mut Value, op: &PatchOp) -> Result<(), CodecError> {
    let path = op.path();
    if path.is_empty() {
        // Whole-document operation.
        return match op {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
                *target = value.clone();
                Ok(())
            }
            PatchOp::Remove { .. } => {
                *target = Value::Null;
                Ok(())
            }
        };
    }

    let tokens = parse_pointer(path)?;
    let (last, parents) = tokens
        .split_last()
        .ok_or_else(|| CodecError::InvalidPointer {
            path: path.to_string(),
        })?;

    let mut cur = target;
    for token in parents {
        cur = descend(cur, token, path)?;
    }

    match cur {
        Value::Object(map) => match op {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
                map.insert(last.clone(), value.clone());
                Ok(())
            }
            PatchOp::Remove { .. } => {
                map.remove(last.as_str())
                    .map(|_| ())
                    .ok_or_else(|| CodecError::MissingPath {
                        path: path.to_string(),
                    })
            }
        },
        Value::Array(items) => {
            let len = items.len();
            match op {
                PatchOp::Add { value, .. } => {
                    let index = if last == "-" { len } else { parse_index(last, path)? };
                    if index > len {
                        return Err(CodecError::IndexOutOfBounds { index, len });
                    }
                    items.insert(index, value.clone());
                    Ok(())
                }
                PatchOp::Replace { value, .. } => {
                    let index = parse_index(last, path)?;
                    let slot = items
                        .get_mut(index)
                        .ok_or(CodecError::IndexOutOfBounds { index, len })?;
                    *slot = value.clone();
                    Ok(())
                }
                PatchOp::Remove { .. } => {
                    let index = parse_index(last, path)?;
                    if index >= len {
                        return Err(CodecError::IndexOutOfBounds { index, len });
                    }
                    items.remove(index);
                    Ok(())
                }
            }
        }
        other => Err(CodecError::StrategyMismatch {
            strategy: "patch",
            found: kind_name(other),
        }),
    }
}

fn descend<'a>(cur: &'a mut Value, token: &str, path: &str) -> Result<&'a mut Value, CodecError> {
    match cur {
        Value::Object(map) => map.get_mut(token).ok_or_else(|| CodecError::MissingPath {
            path: path.to_string(),
        }),
        Value::Array(items) => {
            let len = items.len();
            let index = parse_index(token, path)?;
            items
                .get_mut(index)
                .ok_or(CodecError::IndexOutOfBounds { index, len })
        }
        _ => Err(CodecError::MissingPath {
            path: path.to_string(),
        }),
    }
}

fn parse_index(token: &str, path: &str) -> Result<usize, CodecError> {
    token.parse().map_err(|_| CodecError::InvalidPointer {
        path: path.to_string(),
    })
}

fn parse_pointer(path: &str) -> Result<Vec<String>, CodecError> {
    let rest = path.strip_prefix('/').ok_or_else(|| CodecError::InvalidPointer {
        path: path.to_string(),
    })?;
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn join_pointer(prefix: &str, token: &str) -> String {
    format!("{prefix}/{}", token.replace('~', "~0").replace('/', "~1"))
}
