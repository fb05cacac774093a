//! The canonical command applier.

use lens_codec::apply_update;
use lens_value::{Map, Value, get_path, set_path};

use crate::{ArrayCommand, CommandError, EmitCommand};

/// Applies `command` to `state`, returning the new state.
///
/// Pure: the input state is never mutated. This is the single
/// implementation shared by the server (canonical state) and the client
/// (local mirror).
pub fn apply_emit_command(state: &Value, command: &EmitCommand) -> Result<Value, CommandError> {
    match command {
        EmitCommand::Full { data, replace } => Ok(if *replace {
            data.clone()
        } else {
            merge_shallow(state, data)
        }),
        EmitCommand::Field { field, update } => {
            let mut next = state.clone();
            let base = get_path(&next, field).cloned().unwrap_or(Value::Null);
            let new_value = apply_update(&base, update)?;
            set_path(&mut next, field, new_value)?;
            Ok(next)
        }
        EmitCommand::Batch { updates } => {
            let mut next = state.clone();
            for entry in updates {
                let base = get_path(&next, &entry.field).cloned().unwrap_or(Value::Null);
                let new_value = apply_update(&base, &entry.update)?;
                set_path(&mut next, &entry.field, new_value)?;
            }
            Ok(next)
        }
        EmitCommand::Array { op, field } => match field {
            None => {
                let items = as_array(state, ".")?;
                Ok(Value::Array(apply_array_command(items, op)?))
            }
            Some(path) => {
                let mut next = state.clone();
                let base = get_path(&next, path).cloned().unwrap_or(Value::Null);
                let items = as_array(&base, path)?;
                let new_items = apply_array_command(items, op)?;
                set_path(&mut next, path, Value::Array(new_items))?;
                Ok(next)
            }
        },
    }
}

/// Shallow top-level merge: fields of `incoming` overwrite fields of
/// `base`; other fields survive. Non-object operands fall back to replace.
pub fn merge_shallow(base: &Value, incoming: &Value) -> Value {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            let mut merged = base_map.clone();
            for (name, field) in incoming_map {
                merged.insert(name.clone(), field.clone());
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}

/// Reads a value as an array, treating null/missing as empty.
fn as_array(value: &Value, path: &str) -> Result<Vec<Value>, CommandError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Null => Ok(Vec::new()),
        _ => Err(CommandError::NotAnArray {
            path: path.to_string(),
        }),
    }
}

fn apply_array_command(mut items: Vec<Value>, op: &ArrayCommand) -> Result<Vec<Value>, CommandError> {
    match op {
        ArrayCommand::Push { value } => items.push(value.clone()),
        ArrayCommand::Unshift { value } => items.insert(0, value.clone()),
        ArrayCommand::Insert { index, value } => {
            if *index > items.len() {
                return Err(CommandError::IndexOutOfBounds {
                    index: *index,
                    len: items.len(),
                });
            }
            items.insert(*index, value.clone());
        }
        ArrayCommand::Remove { index } => {
            if *index >= items.len() {
                return Err(CommandError::IndexOutOfBounds {
                    index: *index,
                    len: items.len(),
                });
            }
            items.remove(*index);
        }
        ArrayCommand::RemoveById { id } => {
            let position = position_by_id(&items, id)?;
            items.remove(position);
        }
        ArrayCommand::Update { index, value } => {
            let len = items.len();
            let slot = items
                .get_mut(*index)
                .ok_or(CommandError::IndexOutOfBounds { index: *index, len })?;
            *slot = value.clone();
        }
        ArrayCommand::UpdateById { id, value } => {
            let position = position_by_id(&items, id)?;
            items[position] = value.clone();
        }
        ArrayCommand::Merge { index, value } => {
            let len = items.len();
            let slot = items
                .get_mut(*index)
                .ok_or(CommandError::IndexOutOfBounds { index: *index, len })?;
            *slot = merge_shallow(slot, value);
        }
        ArrayCommand::MergeById { id, value } => {
            let position = position_by_id(&items, id)?;
            items[position] = merge_shallow(&items[position], value);
        }
    }
    Ok(items)
}

fn position_by_id(items: &[Value], id: &Value) -> Result<usize, CommandError> {
    items
        .iter()
        .position(|item| item.get("id") == Some(id))
        .ok_or_else(|| CommandError::IdNotFound { id: id.clone() })
}

/// Convenience for starting from nothing: applies onto an empty object.
pub fn apply_to_empty(command: &EmitCommand) -> Result<Value, CommandError> {
    apply_emit_command(&Value::Object(Map::new()), command)
}
