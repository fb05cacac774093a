//! The `EmitCommand` tagged union as it appears on the wire.

use lens_codec::Update;
use lens_value::Value;
use serde::{Deserialize, Serialize};

/// One field-and-update pair inside a batch command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    /// Field name, possibly dotted (`"author.name"`).
    pub field: String,
    /// The update to apply to that field.
    pub update: Update,
}

/// A state-change command emitted by resolver code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmitCommand {
    /// Whole-entity write. `replace` overrides the default shallow merge.
    Full {
        /// The entity data.
        data: Value,
        /// `true` to replace the prior state instead of merging into it.
        #[serde(default)]
        replace: bool,
    },
    /// Single-field write with an explicit transfer strategy.
    Field {
        /// Field name, possibly dotted; intermediate objects are created.
        field: String,
        /// The update for that field.
        update: Update,
    },
    /// Multi-field atomic write.
    Batch {
        /// Updates applied in order.
        updates: Vec<FieldUpdate>,
    },
    /// Array operation, against the entity root or a named array field.
    Array {
        /// The operation.
        op: ArrayCommand,
        /// Dotted path of the array field; `None` targets the root value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },
}

impl EmitCommand {
    /// Re-addresses the command so it applies under `prefix` (a dotted
    /// path) instead of at the root. Used for live-field emits, which are
    /// scoped to the field's position in the operation result.
    ///
    /// A `full` command becomes a whole-value write of the prefixed field;
    /// merge semantics do not survive re-addressing.
    pub fn prefixed(self, prefix: &str) -> EmitCommand {
        if prefix.is_empty() {
            return self;
        }
        match self {
            EmitCommand::Full { data, .. } => EmitCommand::Field {
                field: prefix.to_string(),
                update: Update::Value(data),
            },
            EmitCommand::Field { field, update } => EmitCommand::Field {
                field: format!("{prefix}.{field}"),
                update,
            },
            EmitCommand::Batch { updates } => EmitCommand::Batch {
                updates: updates
                    .into_iter()
                    .map(|entry| FieldUpdate {
                        field: format!("{prefix}.{}", entry.field),
                        update: entry.update,
                    })
                    .collect(),
            },
            EmitCommand::Array { op, field } => EmitCommand::Array {
                op,
                field: Some(match field {
                    Some(inner) => format!("{prefix}.{inner}"),
                    None => prefix.to_string(),
                }),
            },
        }
    }
}

/// Index- and id-addressed array operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ArrayCommand {
    /// Append to the end.
    Push {
        /// Element to append.
        value: Value,
    },
    /// Prepend to the front.
    Unshift {
        /// Element to prepend.
        value: Value,
    },
    /// Insert before `index`.
    Insert {
        /// Insertion position (may equal the length).
        index: usize,
        /// Element to insert.
        value: Value,
    },
    /// Remove the element at `index`.
    Remove {
        /// Position to remove.
        index: usize,
    },
    /// Remove the element whose `id` field equals `id`.
    RemoveById {
        /// Id to match.
        id: Value,
    },
    /// Replace the element at `index`.
    Update {
        /// Position to replace.
        index: usize,
        /// New element.
        value: Value,
    },
    /// Replace the element whose `id` field equals `id`.
    UpdateById {
        /// Id to match.
        id: Value,
        /// New element.
        value: Value,
    },
    /// Shallow-merge `value` into the object element at `index`.
    Merge {
        /// Position to merge into.
        index: usize,
        /// Fields to merge.
        value: Value,
    },
    /// Shallow-merge `value` into the object element whose `id` matches.
    MergeById {
        /// Id to match.
        id: Value,
        /// Fields to merge.
        value: Value,
    },
}
