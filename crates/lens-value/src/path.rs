//! Dotted-path access into [`Value`] trees.
//!
//! Emit commands address nested fields with dotted paths (`"author.name"`).
//! Reads return `None` on any missing hop; writes create intermediate
//! objects as needed.

use serde_json::{Map, Value};

/// Errors from dotted-path writes.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// A path segment was empty (`"a..b"` or a leading/trailing dot).
    #[error("empty segment in path {path:?}")]
    EmptySegment {
        /// The offending full path.
        path: String,
    },

    /// An intermediate hop exists but is not an object.
    #[error("cannot descend into non-object at {segment:?} of path {path:?}")]
    NotAnObject {
        /// The segment that could not be entered.
        segment: String,
        /// The offending full path.
        path: String,
    },
}

/// Reads the value at `path`, where `path` is one or more field names
/// joined by dots. Returns `None` if any hop is missing or non-object.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = root;
    for segment in path.split('.') {
        cur = cur.as_object()?.get(segment)?;
    }
    Some(cur)
}

/// Writes `new` at `path`, creating intermediate objects for missing or
/// null hops. Fails if an intermediate hop holds a non-object value.
pub fn set_path(root: &mut Value, path: &str, new: Value) -> Result<(), PathError> {
    let mut cur = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segment.is_empty() {
            return Err(PathError::EmptySegment {
                path: path.to_string(),
            });
        }
        if cur.is_null() {
            *cur = Value::Object(Map::new());
        }
        let map = match cur {
            Value::Object(map) => map,
            _ => {
                return Err(PathError::NotAnObject {
                    segment: segment.to_string(),
                    path: path.to_string(),
                });
            }
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), new);
            return Ok(());
        }
        cur = map.entry(segment.to_string()).or_insert(Value::Null);
    }
    Err(PathError::EmptySegment {
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_top_level() {
        let v = json!({"title": "Hello"});
        assert_eq!(get_path(&v, "title"), Some(&json!("Hello")));
        assert_eq!(get_path(&v, "missing"), None);
    }

    #[test]
    fn test_get_nested() {
        let v = json!({"author": {"name": "A"}});
        assert_eq!(get_path(&v, "author.name"), Some(&json!("A")));
        assert_eq!(get_path(&v, "author.missing"), None);
        assert_eq!(get_path(&v, "author.name.deeper"), None);
    }

    #[test]
    fn test_set_creates_intermediate_objects() {
        let mut v = json!({});
        set_path(&mut v, "a.b.c", json!(1)).unwrap();
        assert_eq!(v, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_set_overwrites_existing() {
        let mut v = json!({"a": {"b": 1}});
        set_path(&mut v, "a.b", json!(2)).unwrap();
        assert_eq!(v, json!({"a": {"b": 2}}));
    }

    #[test]
    fn test_set_through_null_hop() {
        let mut v = json!({"a": null});
        set_path(&mut v, "a.b", json!(true)).unwrap();
        assert_eq!(v, json!({"a": {"b": true}}));
    }

    #[test]
    fn test_set_rejects_non_object_hop() {
        let mut v = json!({"a": 1});
        let err = set_path(&mut v, "a.b", json!(2)).unwrap_err();
        assert!(matches!(err, PathError::NotAnObject { .. }));
        // State is untouched on failure.
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn test_empty_segment_rejected() {
        let mut v = json!({});
        assert!(matches!(
            set_path(&mut v, "a..b", json!(1)),
            Err(PathError::EmptySegment { .. })
        ));
    }
}
