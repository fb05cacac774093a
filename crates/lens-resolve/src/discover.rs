//! Entity type discovery for untyped value trees.

use lens_value::{Map, Value};

use crate::{EntityDef, ResolveConfig, SchemaRegistry};

/// Finds the entity type of an object.
///
/// An explicit `__typename` or `_type` tag always wins. Without a tag, and
/// only when shape inference is enabled, the object is matched against
/// every registered entity: a candidate qualifies when at least half of
/// the object's keys are fields of the candidate, and the candidate with
/// the highest overlap wins.
pub fn discover_type<'a>(
    registry: &'a SchemaRegistry,
    object: &Map<String, Value>,
    config: &ResolveConfig,
) -> Option<&'a EntityDef> {
    for tag in ["__typename", "_type"] {
        if let Some(Value::String(name)) = object.get(tag) {
            return registry.get(name);
        }
    }
    if !config.allow_shape_inference || object.is_empty() {
        return None;
    }

    let mut best: Option<(&EntityDef, usize)> = None;
    for candidate in registry.entities() {
        let overlap = candidate
            .field_names()
            .filter(|name| object.contains_key(*name))
            .count();
        if overlap * 2 < object.len() {
            continue;
        }
        match best {
            Some((_, best_overlap)) if best_overlap >= overlap => {}
            _ => best = Some((candidate, overlap)),
        }
    }
    best.map(|(def, _)| def)
}
