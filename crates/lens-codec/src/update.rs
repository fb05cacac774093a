//! Strategy selection and application for per-field updates.

use lens_value::Value;
use serde::{Deserialize, Serialize};

use crate::{
    ArrayDiff, ArrayDiffOp, CodecError, PatchOp, TextEdit, apply_array_ops, apply_patch,
    compute_array_diff, json_patch, kind_name,
    text_delta::{apply_text_delta, compute_text_delta},
};

/// One field's change as it travels on the wire:
/// `{"strategy": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "data", rename_all = "lowercase")]
pub enum Update {
    /// The new value, whole.
    Value(Value),
    /// Text splices against the previous string.
    Delta(Vec<TextEdit>),
    /// JSON patch against the previous object.
    Patch(Vec<PatchOp>),
    /// Indexed operations against the previous array.
    Array(Vec<ArrayDiffOp>),
}

/// Picks the transfer strategy for the change from `old` to `new`.
///
/// Strings large enough and similar enough go as deltas; objects go as
/// patches; arrays go as indexed ops unless the diff collapses to a whole
/// replace; everything else ships the new value.
pub fn create_update(old: &Value, new: &Value) -> Update {
    match (old, new) {
        (Value::String(old_text), Value::String(new_text)) => {
            match compute_text_delta(old_text, new_text) {
                Some(edits) => Update::Delta(edits),
                None => Update::Value(new.clone()),
            }
        }
        (Value::Object(_), Value::Object(_)) => Update::Patch(json_patch::diff(old, new)),
        (Value::Array(old_items), Value::Array(new_items)) => {
            match compute_array_diff(old_items, new_items) {
                ArrayDiff::Ops(ops) => Update::Array(ops),
                ArrayDiff::Replace => Update::Value(new.clone()),
            }
        }
        _ => Update::Value(new.clone()),
    }
}

/// Applies `update` to `base`, yielding the new value. Exact inverse of
/// [`create_update`] over the strategy's domain; also runs on the client.
pub fn apply_update(base: &Value, update: &Update) -> Result<Value, CodecError> {
    match update {
        Update::Value(new) => Ok(new.clone()),
        Update::Delta(edits) => match base {
            Value::String(text) => Ok(Value::String(apply_text_delta(text, edits)?)),
            other => Err(CodecError::StrategyMismatch {
                strategy: "delta",
                found: kind_name(other),
            }),
        },
        Update::Patch(ops) => apply_patch(base, ops),
        Update::Array(ops) => match base {
            Value::Array(items) => Ok(Value::Array(apply_array_ops(items, ops)?)),
            other => Err(CodecError::StrategyMismatch {
                strategy: "array",
                found: kind_name(other),
            }),
        },
    }
}
