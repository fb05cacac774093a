//! Operation definitions and the path-keyed registry.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use lens_resolve::{CleanupBag, LiveEmit, ResolveError};
use lens_value::Value;
use rustc_hash::FxHashMap;

use crate::OpContext;

/// An execution request as the transport hands it over.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    /// Registered operation path, e.g. `"post.get"`.
    pub path: String,
    /// Raw input; `$select` is peeled off before validation.
    pub input: Value,
}

/// Root resolver returning one value.
pub type OperationFn =
    Arc<dyn Fn(Value, OpContext) -> BoxFuture<'static, Result<Value, ResolveError>> + Send + Sync>;

/// Root resolver returning a stream of values (one snapshot each).
pub type OperationStreamFn = Arc<
    dyn Fn(Value, OpContext) -> BoxStream<'static, Result<Value, ResolveError>> + Send + Sync,
>;

/// Starts a publisher for an operation with a `subscribe` phase.
pub type OperationSubscribeFn = Arc<dyn Fn(LiveEmit, &CleanupBag, OpContext) + Send + Sync>;

/// Opaque input validation hook; runs on the input after `$select` is
/// removed.
pub type ValidateFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// How an operation produces its result stream.
#[derive(Clone)]
pub enum OperationResolver {
    /// One snapshot; the stream stays open for live/ops updates.
    Query(OperationFn),
    /// One snapshot, then complete.
    Mutation(OperationFn),
    /// One snapshot per yielded value; completes with the source.
    Stream(OperationStreamFn),
    /// Initial snapshot from `resolve`, then ops from the publisher.
    Live {
        /// Computes the initial value.
        resolve: OperationFn,
        /// Starts the publisher.
        subscribe: OperationSubscribeFn,
    },
}

/// One registered operation.
#[derive(Clone)]
pub struct OperationDef {
    path: String,
    resolver: OperationResolver,
    validate: Option<ValidateFn>,
}

impl OperationDef {
    /// A read operation whose stream stays open for live updates.
    pub fn query<F, Fut>(path: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(Value, OpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
    {
        Self {
            path: path.into(),
            resolver: OperationResolver::Query(Arc::new(move |input, ctx| {
                resolver(input, ctx).boxed()
            })),
            validate: None,
        }
    }

    /// A write operation; its stream completes after the snapshot.
    pub fn mutation<F, Fut>(path: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(Value, OpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
    {
        Self {
            path: path.into(),
            resolver: OperationResolver::Mutation(Arc::new(move |input, ctx| {
                resolver(input, ctx).boxed()
            })),
            validate: None,
        }
    }

    /// A streaming operation: each yielded value becomes a snapshot.
    pub fn stream<F, S>(path: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(Value, OpContext) -> S + Send + Sync + 'static,
        S: futures::Stream<Item = Result<Value, ResolveError>> + Send + 'static,
    {
        Self {
            path: path.into(),
            resolver: OperationResolver::Stream(Arc::new(move |input, ctx| {
                resolver(input, ctx).boxed()
            })),
            validate: None,
        }
    }

    /// An operation with a `subscribe` phase.
    pub fn live<F, Fut, S>(path: impl Into<String>, resolver: F, subscribe: S) -> Self
    where
        F: Fn(Value, OpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
        S: Fn(LiveEmit, &CleanupBag, OpContext) + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            resolver: OperationResolver::Live {
                resolve: Arc::new(move |input, ctx| resolver(input, ctx).boxed()),
                subscribe: Arc::new(subscribe),
            },
            validate: None,
        }
    }

    /// Attaches an input validation hook.
    pub fn with_validation<V>(mut self, validate: V) -> Self
    where
        V: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// The operation path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn resolver(&self) -> &OperationResolver {
        &self.resolver
    }

    pub(crate) fn validate(&self) -> Option<&ValidateFn> {
        self.validate.as_ref()
    }
}

/// All registered operations, keyed by path.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    operations: FxHashMap<String, OperationDef>,
}

impl OperationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation; the last registration for a path wins.
    pub fn register(&mut self, operation: OperationDef) {
        self.operations.insert(operation.path.clone(), operation);
    }

    /// Looks up an operation by path.
    pub fn get(&self, path: &str) -> Option<&OperationDef> {
        self.operations.get(path)
    }

    /// Registered paths, sorted for stable handshake output.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.operations.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_lookup_and_paths() {
        let mut registry = OperationRegistry::new();
        registry.register(OperationDef::query("post.get", |_input, _ctx| async {
            Ok(json!({}))
        }));
        registry.register(OperationDef::mutation("post.create", |_input, _ctx| async {
            Ok(json!({}))
        }));

        assert!(registry.get("post.get").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.paths(), vec!["post.create", "post.get"]);
    }

    #[test]
    fn test_validation_hook_attaches() {
        let def = OperationDef::query("q", |_input, _ctx| async { Ok(json!(null)) })
            .with_validation(|input| {
                if input.get("id").is_some() {
                    Ok(())
                } else {
                    Err("id required".into())
                }
            });
        let validate = def.validate().expect("hook present");
        assert!(validate(&json!({"id": "x"})).is_ok());
        assert_eq!(validate(&json!({})).unwrap_err(), "id required");
    }
}
