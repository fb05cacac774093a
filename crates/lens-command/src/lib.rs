//! Emit commands: a resolver's declaration of how to change state.
//!
//! The server interprets commands to maintain canonical state; the client
//! interprets the very same commands to maintain its local mirror. There is
//! exactly one applier, [`apply_emit_command`], so both sides always agree
//! on the result.

mod apply;
mod command;
mod sink;

pub use apply::{apply_emit_command, apply_to_empty, merge_shallow};
pub use command::{ArrayCommand, EmitCommand, FieldUpdate};
pub use sink::CommandSink;

use lens_codec::CodecError;

/// Errors from interpreting an emit command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// A field update could not be applied.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A dotted field path could not be written.
    #[error(transparent)]
    Path(#[from] lens_value::PathError),

    /// An array command targeted a value that is not an array.
    #[error("array command targets non-array value at {path:?}")]
    NotAnArray {
        /// The dotted path of the target (`"."` for the root).
        path: String,
    },

    /// An array index was out of bounds.
    #[error("array index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Array length.
        len: usize,
    },

    /// An id-addressed array command found no element with that id.
    #[error("no array element with id {id}")]
    IdNotFound {
        /// The id that was searched for.
        id: lens_value::Value,
    },

    /// The receiving sink rejected the command.
    #[error("sink rejected command: {0}")]
    Sink(String),
}
