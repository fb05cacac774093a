//! Selection trees: projecting resolved values down to requested fields.

use lens_value::{Map, Value};
use rustc_hash::FxHashMap;

/// One node of a selection: take the field whole, or recurse.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionNode {
    /// Include the field as-is.
    Leaf,
    /// Include the field projected by a nested tree.
    Nested(SelectionTree),
}

/// A parsed `$select` value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionTree {
    fields: FxHashMap<String, SelectionNode>,
}

impl SelectionTree {
    /// Parses a `$select` value: `{"title": true, "author": {"name": true}}`.
    /// Returns `None` for anything but a non-empty object.
    pub fn parse(raw: &Value) -> Option<Self> {
        let Value::Object(map) = raw else {
            return None;
        };
        if map.is_empty() {
            return None;
        }
        let mut fields = FxHashMap::default();
        for (name, node) in map {
            match node {
                Value::Bool(true) => {
                    fields.insert(name.clone(), SelectionNode::Leaf);
                }
                Value::Object(_) => {
                    if let Some(nested) = SelectionTree::parse(node) {
                        fields.insert(name.clone(), SelectionNode::Nested(nested));
                    }
                }
                _ => {}
            }
        }
        Some(Self { fields })
    }

    /// Projects `value` by this tree. `id` is always retained; arrays
    /// project element-wise; scalars pass through untouched.
    pub fn project(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.project_object(map)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.project(item)).collect())
            }
            other => other.clone(),
        }
    }

    fn project_object(&self, map: &Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::new();
        if let Some(id) = map.get("id") {
            out.insert("id".to_string(), id.clone());
        }
        for (name, node) in &self.fields {
            let Some(field) = map.get(name) else {
                continue;
            };
            let projected = match node {
                SelectionNode::Leaf => field.clone(),
                SelectionNode::Nested(tree) => tree.project(field),
            };
            out.insert(name.clone(), projected);
        }
        out
    }

    /// Whether the tree selects nothing.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
