//! Update codec: computes and applies per-field wire updates.
//!
//! [`create_update`] picks the cheapest strategy for transporting the change
//! from one value to another (`value`, `delta`, `patch`, or `array`);
//! [`apply_update`] is its exact inverse and runs on both the server (shadow
//! maintenance) and the client (mirror maintenance).
//!
//! Contract: for every `(old, new)`,
//! `apply_update(old, &create_update(old, new)) == new`.

mod array_diff;
mod json_patch;
mod text_delta;
mod update;

pub use array_diff::{ArrayDiff, ArrayDiffOp, apply_array_ops, compute_array_diff};
pub use json_patch::{PatchOp, apply_patch, diff, diff_objects, patch_byte_size};
pub use text_delta::TextEdit;
pub use update::{Update, apply_update, create_update};

/// Errors from applying an update, patch, delta, or array op.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An update's strategy does not match the shape of the base value.
    #[error("{strategy} update cannot apply to {found} base value")]
    StrategyMismatch {
        /// The strategy that was attempted.
        strategy: &'static str,
        /// The JSON kind of the base value.
        found: &'static str,
    },

    /// A JSON pointer did not resolve against the base value.
    #[error("patch path {path:?} does not resolve")]
    MissingPath {
        /// The offending pointer.
        path: String,
    },

    /// A JSON pointer was syntactically invalid.
    #[error("invalid patch pointer {path:?}")]
    InvalidPointer {
        /// The offending pointer.
        path: String,
    },

    /// An array index was outside the target array.
    #[error("array index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The array length at application time.
        len: usize,
    },

    /// A text edit referenced byte ranges outside the base string.
    #[error("text edit at {position} (delete {delete}) exceeds string of {len} bytes")]
    EditOutOfBounds {
        /// Edit start position in bytes.
        position: usize,
        /// Bytes to delete.
        delete: usize,
        /// Base string length in bytes.
        len: usize,
    },
}

pub(crate) fn kind_name(value: &lens_value::Value) -> &'static str {
    match value {
        lens_value::Value::Null => "null",
        lens_value::Value::Bool(_) => "bool",
        lens_value::Value::Number(_) => "number",
        lens_value::Value::String(_) => "string",
        lens_value::Value::Array(_) => "array",
        lens_value::Value::Object(_) => "object",
    }
}
