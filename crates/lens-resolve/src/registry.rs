//! Entity and field definitions.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use lens_value::Value;
use rustc_hash::FxHashMap;

use crate::live::{CleanupBag, LiveEmit};
use crate::ResolveError;

/// Computes one field from its parent value.
pub type FieldResolveFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ResolveError>> + Send + Sync>;

/// Batch fan-in: computes the field for many parents in one call. Must
/// return exactly one result per parent, in order.
pub type BatchResolveFn =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Vec<Value>, ResolveError>> + Send + Sync>;

/// Starts a live-field publisher. The publisher emits path-prefixed
/// commands through `emit` and registers teardown in the cleanup bag.
pub type SubscribeFn = Arc<dyn Fn(LiveEmit, &CleanupBag) + Send + Sync>;

/// How one field of an entity is produced.
#[derive(Clone)]
pub enum FieldKind {
    /// Taken directly from the source object.
    Expose,
    /// Computed by a resolver, optionally batched across parents.
    Resolve {
        /// The per-parent resolver.
        resolve: FieldResolveFn,
        /// Optional batch fan-in used when several parents need the field
        /// in the same pass.
        batch: Option<BatchResolveFn>,
    },
    /// Resolved once for the initial value, then kept live by a publisher.
    Live {
        /// Computes the initial value.
        resolve: FieldResolveFn,
        /// Starts the publisher.
        subscribe: SubscribeFn,
    },
}

/// One entity type: a name and its field definitions, in declaration
/// order.
#[derive(Clone)]
pub struct EntityDef {
    name: String,
    fields: Vec<(String, FieldKind)>,
}

impl EntityDef {
    /// Starts a definition for the named entity type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declares a field taken directly from the source object.
    pub fn expose(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldKind::Expose));
        self
    }

    /// Declares a resolver-computed field.
    pub fn resolve<F, Fut>(mut self, field: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
    {
        self.fields.push((
            field.into(),
            FieldKind::Resolve {
                resolve: Arc::new(move |parent| resolver(parent).boxed()),
                batch: None,
            },
        ));
        self
    }

    /// Declares a resolver-computed field with a batch fan-in.
    pub fn resolve_batched<F, Fut, B, BFut>(
        mut self,
        field: impl Into<String>,
        resolver: F,
        batch: B,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
        B: Fn(Vec<Value>) -> BFut + Send + Sync + 'static,
        BFut: Future<Output = Result<Vec<Value>, ResolveError>> + Send + 'static,
    {
        self.fields.push((
            field.into(),
            FieldKind::Resolve {
                resolve: Arc::new(move |parent| resolver(parent).boxed()),
                batch: Some(Arc::new(move |parents| batch(parents).boxed())),
            },
        ));
        self
    }

    /// Declares a live field: `resolver` computes the initial value, then
    /// `subscribe` starts a publisher for subsequent changes.
    pub fn live<F, Fut, S>(mut self, field: impl Into<String>, resolver: F, subscribe: S) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
        S: Fn(LiveEmit, &CleanupBag) + Send + Sync + 'static,
    {
        self.fields.push((
            field.into(),
            FieldKind::Live {
                resolve: Arc::new(move |parent| resolver(parent).boxed()),
                subscribe: Arc::new(subscribe),
            },
        ));
        self
    }

    /// The entity type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field definitions in declaration order.
    pub fn fields(&self) -> &[(String, FieldKind)] {
        &self.fields
    }

    /// Field names, for overlap-based type discovery.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

/// All registered entity types.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    entities: FxHashMap<String, EntityDef>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type; later registrations with the same name
    /// replace earlier ones.
    pub fn register(&mut self, entity: EntityDef) {
        self.entities.insert(entity.name.clone(), entity);
    }

    /// Looks up an entity type by name.
    pub fn get(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Registered type names, sorted for stable output.
    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.keys().cloned().collect();
        names.sort();
        names
    }

    /// Iterates all definitions (discovery scoring).
    pub(crate) fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.entities.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_builder_declares_fields_in_order() {
        let def = EntityDef::new("Post")
            .expose("id")
            .expose("title")
            .resolve("stars", |_parent| async { Ok(json!(5)) });

        assert_eq!(def.name(), "Post");
        let names: Vec<&str> = def.field_names().collect();
        assert_eq!(names, vec!["id", "title", "stars"]);

        let FieldKind::Resolve { resolve, batch } = &def.fields()[2].1 else {
            panic!("expected resolve field");
        };
        assert!(batch.is_none());
        assert_eq!(resolve(json!({})).await.unwrap(), json!(5));
    }

    #[test]
    fn test_registry_lookup_and_names() {
        let mut registry = SchemaRegistry::new();
        registry.register(EntityDef::new("Post").expose("id"));
        registry.register(EntityDef::new("User").expose("id"));

        assert!(registry.get("Post").is_some());
        assert!(registry.get("Ghost").is_none());
        assert_eq!(registry.entity_names(), vec!["Post", "User"]);
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut registry = SchemaRegistry::new();
        registry.register(EntityDef::new("Post").expose("id"));
        registry.register(EntityDef::new("Post").expose("id").expose("title"));
        assert_eq!(registry.get("Post").unwrap().fields().len(), 2);
    }
}
