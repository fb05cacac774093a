//! Value model shared by every Lens crate.
//!
//! Entity field values are heterogeneous, so the whole engine operates on a
//! single sum type: [`Value`] (null / bool / number / string / array /
//! insertion-ordered object). Hashing, diffing, and equality are defined on
//! this type and nothing else.

pub use serde_json::{Map, Value, json};

mod hash;
mod key;
mod path;

pub use hash::{content_hash, hash_hex, map_hash, slice_hash};
pub use key::EntityKey;
pub use path::{PathError, get_path, set_path};
