//! Per-subscription field sets.

use lens_wire::FieldSpec;
use rustc_hash::FxHashSet;

/// Which fields of an entity a subscription covers: everything, or a
/// finite set of field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSet {
    /// The `"*"` wildcard.
    All,
    /// An explicit set of field names.
    Named(FxHashSet<String>),
}

impl FieldSet {
    /// Builds a named set from an iterator of field names.
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSet::Named(names.into_iter().map(Into::into).collect())
    }

    /// Converts the wire-level spec into a field set.
    pub fn from_spec(spec: &FieldSpec) -> Self {
        match spec.names() {
            None => FieldSet::All,
            Some(names) => FieldSet::named(names),
        }
    }

    /// Whether `field` is covered by this set.
    pub fn contains(&self, field: &str) -> bool {
        match self {
            FieldSet::All => true,
            FieldSet::Named(names) => names.contains(field),
        }
    }
}
