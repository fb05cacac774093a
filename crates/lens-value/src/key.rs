//! Entity keys: `"<type>:<id>"`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque key identifying one entity instance, formatted `"<type>:<id>"`.
///
/// Produced once at the emit/subscribe boundary and treated as opaque
/// everywhere else; [`EntityKey::split`] exists only for cleanup paths that
/// need the original parts back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    /// Builds a key from an entity type name and instance id.
    pub fn new(entity: &str, id: &str) -> Self {
        Self(format!("{entity}:{id}"))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the key back into `(type, id)` at the first colon.
    ///
    /// The id half may itself contain colons; the type half never does.
    pub fn split(&self) -> (&str, &str) {
        match self.0.split_once(':') {
            Some((entity, id)) => (entity, id),
            None => (self.0.as_str(), ""),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}
