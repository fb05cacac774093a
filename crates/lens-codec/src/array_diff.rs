//! Indexed diffs for array-shaped values.
//!
//! The diff trims the common prefix and suffix, then expresses the middle
//! as replace / insert / remove operations applied sequentially. When the
//! two arrays share no structure at all, the diff collapses to a whole
//! replace and the caller ships the new array with `value` strategy.

use lens_value::Value;
use serde::{Deserialize, Serialize};

use crate::CodecError;

/// One sequential operation against an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ArrayDiffOp {
    /// Insert `value` before `index` (index may equal the current length).
    Insert {
        /// Position of the insertion.
        index: usize,
        /// Element to insert.
        value: Value,
    },
    /// Replace the element at `index`.
    Replace {
        /// Position of the replacement.
        index: usize,
        /// New element.
        value: Value,
    },
    /// Remove the element at `index`.
    Remove {
        /// Position of the removal.
        index: usize,
    },
}

/// Result of diffing two arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayDiff {
    /// The change is expressible as indexed operations.
    Ops(Vec<ArrayDiffOp>),
    /// No shared structure; send the whole new array instead.
    Replace,
}

/// Diffs `old` against `new`.
///
/// Returns [`ArrayDiff::Replace`] when the arrays share neither a common
/// prefix nor suffix (and at least one is non-empty); equal arrays yield
/// an empty op list.
pub fn compute_array_diff(old: &[Value], new: &[Value]) -> ArrayDiff {
    let prefix = old
        .iter()
        .zip(new)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(max_suffix);

    if prefix == 0 && suffix == 0 && !(old.is_empty() && new.is_empty()) {
        return ArrayDiff::Replace;
    }

    let middle_old = old.len() - prefix - suffix;
    let middle_new = new.len() - prefix - suffix;
    let paired = middle_old.min(middle_new);

    let mut ops = Vec::with_capacity(middle_old.max(middle_new));
    for i in 0..paired {
        ops.push(ArrayDiffOp::Replace {
            index: prefix + i,
            value: new[prefix + i].clone(),
        });
    }
    for i in paired..middle_new {
        ops.push(ArrayDiffOp::Insert {
            index: prefix + i,
            value: new[prefix + i].clone(),
        });
    }
    // Sequential removes at a fixed index: each removal shifts the rest left.
    for _ in paired..middle_old {
        ops.push(ArrayDiffOp::Remove {
            index: prefix + middle_new,
        });
    }

    ArrayDiff::Ops(ops)
}

/// Applies `ops` in order to a copy of `base`.
pub fn apply_array_ops(base: &[Value], ops: &[ArrayDiffOp]) -> Result<Vec<Value>, CodecError> {
    let mut out = base.to_vec();
    for op in ops {
        match op {
            ArrayDiffOp::Insert { index, value } => {
                if *index > out.len() {
                    return Err(CodecError::IndexOutOfBounds {
                        index: *index,
                        len: out.len(),
                    });
                }
                out.insert(*index, value.clone());
            }
            ArrayDiffOp::Replace { index, value } => {
                let len = out.len();
                let slot = out
                    .get_mut(*index)
                    .ok_or(CodecError::IndexOutOfBounds { index: *index, len })?;
                *slot = value.clone();
            }
            ArrayDiffOp::Remove { index } => {
                if *index >= out.len() {
                    return Err(CodecError::IndexOutOfBounds {
                        index: *index,
                        len: out.len(),
                    });
                }
                out.remove(*index);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vals(raw: Value) -> Vec<Value> {
        raw.as_array().cloned().unwrap_or_default()
    }

    fn roundtrip(old: Value, new: Value) {
        let old = vals(old);
        let new = vals(new);
        match compute_array_diff(&old, &new) {
            ArrayDiff::Ops(ops) => {
                assert_eq!(apply_array_ops(&old, &ops).unwrap(), new, "ops {ops:?}")
            }
            ArrayDiff::Replace => {} // caller ships `new` whole
        }
    }

    #[test]
    fn test_equal_arrays_yield_no_ops() {
        let items = vals(json!([1, 2, 3]));
        assert_eq!(compute_array_diff(&items, &items), ArrayDiff::Ops(vec![]));
    }

    #[test]
    fn test_append_is_single_insert() {
        let old = vals(json!([1, 2]));
        let new = vals(json!([1, 2, 3]));
        assert_eq!(
            compute_array_diff(&old, &new),
            ArrayDiff::Ops(vec![ArrayDiffOp::Insert {
                index: 2,
                value: json!(3),
            }])
        );
    }

    #[test]
    fn test_middle_replace() {
        let old = vals(json!([1, 2, 3]));
        let new = vals(json!([1, 9, 3]));
        assert_eq!(
            compute_array_diff(&old, &new),
            ArrayDiff::Ops(vec![ArrayDiffOp::Replace {
                index: 1,
                value: json!(9),
            }])
        );
    }

    #[test]
    fn test_middle_removals_are_sequential() {
        let old = vals(json!([1, 2, 3, 4, 5]));
        let new = vals(json!([1, 5]));
        let ArrayDiff::Ops(ops) = compute_array_diff(&old, &new) else {
            panic!("expected ops");
        };
        assert_eq!(apply_array_ops(&old, &ops).unwrap(), new);
    }

    #[test]
    fn test_disjoint_arrays_collapse_to_replace() {
        let old = vals(json!([1, 2]));
        let new = vals(json!([3, 4]));
        assert_eq!(compute_array_diff(&old, &new), ArrayDiff::Replace);
    }

    #[test]
    fn test_empty_to_nonempty_collapses() {
        let old = vals(json!([]));
        let new = vals(json!([1]));
        assert_eq!(compute_array_diff(&old, &new), ArrayDiff::Replace);
    }

    #[test]
    fn test_roundtrip_matrix() {
        roundtrip(json!([1, 2, 3]), json!([1, 2, 3, 4]));
        roundtrip(json!([1, 2, 3, 4]), json!([1, 4]));
        roundtrip(json!([1, 2, 3]), json!([1, 9, 9, 3]));
        roundtrip(json!([{"id": 1}, {"id": 2}]), json!([{"id": 1}, {"id": 2, "x": true}]));
        roundtrip(json!([1]), json!([]));
        roundtrip(json!([]), json!([]));
    }

    #[test]
    fn test_apply_out_of_bounds() {
        let result = apply_array_ops(&[], &[ArrayDiffOp::Remove { index: 0 }]);
        assert!(matches!(result, Err(CodecError::IndexOutOfBounds { .. })));
    }
}
