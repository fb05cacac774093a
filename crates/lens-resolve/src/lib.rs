//! Field resolver graph.
//!
//! Given a resolved root value and a selection tree, walk the value,
//! dispatch per-field resolvers for every entity-typed subtree (batching
//! same-field work through a per-request loader), register live-field
//! publishers, and finally project the result through the selection.

mod discover;
mod graph;
mod live;
mod loader;
mod registry;
mod selection;

pub use discover::discover_type;
pub use graph::{LiveRegistration, ResolvedGraph, resolve_graph};
pub use live::{CleanupBag, LiveEmit};
pub use loader::Loader;
pub use registry::{
    BatchResolveFn, EntityDef, FieldKind, FieldResolveFn, SchemaRegistry, SubscribeFn,
};
pub use selection::{SelectionNode, SelectionTree};

/// How the graph walk behaves.
#[derive(Debug, Clone)]
pub struct ResolveConfig {
    /// Permit overlap-scoring type discovery for objects without an
    /// explicit `__typename`/`_type` tag. Off by default: shape inference
    /// is a compatibility fallback, not a design to rely on.
    pub allow_shape_inference: bool,
    /// Maximum resolution rounds before the walk aborts.
    pub max_depth: usize,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            allow_shape_inference: false,
            max_depth: 16,
        }
    }
}

/// Errors from the resolver graph.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    /// A resolver returned an error. Collapses that field to null; the
    /// walk continues.
    #[error("resolver for {type_name}.{field} failed: {message}")]
    Resolver {
        /// Entity type name.
        type_name: String,
        /// Field name.
        field: String,
        /// The resolver's own message.
        message: String,
    },

    /// A batch fan-in returned the wrong number of results.
    #[error("batch for {type_name}.{field} returned {got} results for {expected} parents")]
    BatchShape {
        /// Entity type name.
        type_name: String,
        /// Field name.
        field: String,
        /// Expected result count.
        expected: usize,
        /// Actual result count.
        got: usize,
    },

    /// The resolution frontier kept producing new entities past the
    /// configured depth.
    #[error("resolution exceeded max depth {max}")]
    DepthExceeded {
        /// The configured bound.
        max: usize,
    },

    /// Free-form failure raised inside user resolver code.
    #[error("{0}")]
    Message(String),
}

impl ResolveError {
    /// Shorthand for user resolver code.
    pub fn msg(message: impl Into<String>) -> Self {
        ResolveError::Message(message.into())
    }
}
