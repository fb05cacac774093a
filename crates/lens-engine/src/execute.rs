//! Operation execution.

use std::sync::Arc;

use futures::StreamExt;
use lens_command::CommandSink;
use lens_resolve::{
    CleanupBag, LiveEmit, Loader, ResolveConfig, SchemaRegistry, SelectionTree, resolve_graph,
};
use lens_value::Value;
use tokio::sync::mpsc;

use crate::registry::{OperationRegistry, OperationRequest, OperationResolver};
use crate::stream::{OperationHandle, OperationStream};
use crate::{EngineError, OpContext};

/// Key under which a selection tree rides along inside operation input.
const SELECT_KEY: &str = "$select";

/// Dispatches operations and drives their result streams.
pub struct ExecutionEngine {
    operations: OperationRegistry,
    schema: SchemaRegistry,
    sink: Arc<dyn CommandSink>,
    config: ResolveConfig,
}

impl ExecutionEngine {
    /// Builds an engine over the given registries. `sink` receives every
    /// entity-addressed emit from resolver code.
    pub fn new(
        operations: OperationRegistry,
        schema: SchemaRegistry,
        sink: Arc<dyn CommandSink>,
        config: ResolveConfig,
    ) -> Self {
        Self {
            operations,
            schema,
            sink,
            config,
        }
    }

    /// Registered operation paths (handshake catalog).
    pub fn operation_paths(&self) -> Vec<String> {
        self.operations.paths()
    }

    /// Registered entity type names (handshake catalog).
    pub fn entity_names(&self) -> Vec<String> {
        self.schema.entity_names()
    }

    /// Executes an operation, returning its lazy event stream.
    ///
    /// Failures (unknown path, validation, resolver errors) are delivered
    /// in-stream as one `error` event followed by `complete`; this method
    /// itself never fails.
    pub fn execute(&self, request: OperationRequest) -> OperationStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let cleanups = CleanupBag::new();
        let handle = OperationHandle::new(cleanups.clone(), tx);
        let stream = OperationStream::new(rx, handle.clone());

        let (input, selection) = peel_select(request.input);

        let Some(def) = self.operations.get(&request.path) else {
            let error = EngineError::NotFound(request.path.clone());
            handle.fail(error.to_string(), error.code());
            return stream;
        };
        if let Some(validate) = def.validate() {
            if let Err(message) = validate(&input) {
                let error = EngineError::Validation(message);
                handle.fail(error.to_string(), error.code());
                return stream;
            }
        }

        let resolver = def.resolver().clone();
        let ctx = OpContext::new(self.sink.clone(), cleanups);
        let schema = self.schema.clone();
        let config = self.config.clone();
        let task_handle = handle.clone();
        tokio::spawn(async move {
            drive(resolver, input, selection, schema, config, ctx, task_handle).await;
        });

        stream
    }
}

/// Splits `$select` out of the input. Validation sees the remainder.
fn peel_select(input: Value) -> (Value, Option<SelectionTree>) {
    match input {
        Value::Object(mut map) => {
            let selection = map.remove(SELECT_KEY).and_then(|raw| SelectionTree::parse(&raw));
            (Value::Object(map), selection)
        }
        other => (other, None),
    }
}

async fn drive(
    resolver: OperationResolver,
    input: Value,
    selection: Option<SelectionTree>,
    schema: SchemaRegistry,
    config: ResolveConfig,
    ctx: OpContext,
    handle: OperationHandle,
) {
    match resolver {
        OperationResolver::Query(resolve) => {
            // Stays open after the snapshot: live fields keep publishing
            // ops until the consumer cancels.
            let _ = run_root(&resolve, input, &selection, &schema, &config, &ctx, &handle).await;
        }
        OperationResolver::Mutation(resolve) => {
            if run_root(&resolve, input, &selection, &schema, &config, &ctx, &handle)
                .await
                .is_ok()
            {
                handle.complete();
            }
        }
        OperationResolver::Stream(resolve) => {
            let mut source = resolve(input, ctx.clone());
            while let Some(item) = source.next().await {
                if handle.is_cancelled() {
                    return;
                }
                match item {
                    Ok(root) => {
                        if deliver_snapshot(root, &selection, &schema, &config, &handle)
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(error) => {
                        let error = EngineError::Resolver(error.to_string());
                        handle.fail(error.to_string(), error.code());
                        return;
                    }
                }
            }
            handle.complete();
        }
        OperationResolver::Live { resolve, subscribe } => {
            if run_root(&resolve, input, &selection, &schema, &config, &ctx, &handle)
                .await
                .is_err()
            {
                return;
            }
            if handle.is_cancelled() {
                return;
            }
            let emit = ops_emit(handle.clone(), String::new());
            subscribe(emit, handle.cleanups(), ctx);
        }
    }
}

/// Resolves the root value, runs the field graph, starts live publishers,
/// projects the selection, and delivers the snapshot.
async fn run_root(
    resolve: &crate::registry::OperationFn,
    input: Value,
    selection: &Option<SelectionTree>,
    schema: &SchemaRegistry,
    config: &ResolveConfig,
    ctx: &OpContext,
    handle: &OperationHandle,
) -> Result<(), ()> {
    let root = match resolve(input, ctx.clone()).await {
        Ok(root) => root,
        Err(error) => {
            let error = EngineError::Resolver(error.to_string());
            handle.fail(error.to_string(), error.code());
            return Err(());
        }
    };

    let mut loader = Loader::new();
    let graph = match resolve_graph(root, schema, config, &mut loader).await {
        Ok(graph) => graph,
        Err(error) => {
            let error = EngineError::Resolver(error.to_string());
            handle.fail(error.to_string(), error.code());
            return Err(());
        }
    };

    for registration in graph.live {
        if handle.is_cancelled() {
            return Err(());
        }
        let emit = ops_emit(handle.clone(), registration.path);
        (registration.subscribe)(emit, handle.cleanups());
    }

    let data = match selection {
        Some(tree) => tree.project(&graph.value),
        None => graph.value,
    };
    handle.send_snapshot(data);
    Ok(())
}

async fn deliver_snapshot(
    root: Value,
    selection: &Option<SelectionTree>,
    schema: &SchemaRegistry,
    config: &ResolveConfig,
    handle: &OperationHandle,
) -> Result<(), ()> {
    let mut loader = Loader::new();
    let graph = match resolve_graph(root, schema, config, &mut loader).await {
        Ok(graph) => graph,
        Err(error) => {
            let error = EngineError::Resolver(error.to_string());
            handle.fail(error.to_string(), error.code());
            return Err(());
        }
    };
    let data = match selection {
        Some(tree) => tree.project(&graph.value),
        None => graph.value,
    };
    handle.send_snapshot(data);
    Ok(())
}

/// Builds the emit side of a live publisher: each command is re-addressed
/// under `path` and surfaced as one ops event.
fn ops_emit(handle: OperationHandle, path: String) -> LiveEmit {
    Arc::new(move |command| {
        if handle.is_cancelled() {
            return;
        }
        handle.send_ops(vec![command.prefixed(&path)]);
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use lens_command::{CommandError, EmitCommand};
    use lens_resolve::{EntityDef, ResolveError};
    use serde_json::json;

    use super::*;
    use crate::registry::OperationDef;
    use crate::stream::StreamEvent;

    /// Records every command routed through the sink.
    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<(String, String, EmitCommand)>>);

    impl CommandSink for RecordingSink {
        fn process(
            &self,
            entity: &str,
            id: &str,
            command: EmitCommand,
        ) -> Result<(), CommandError> {
            self.0
                .lock()
                .unwrap()
                .push((entity.to_string(), id.to_string(), command));
            Ok(())
        }
    }

    fn engine_with(operations: OperationRegistry) -> (ExecutionEngine, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let engine = ExecutionEngine::new(
            operations,
            SchemaRegistry::new(),
            sink.clone(),
            ResolveConfig::default(),
        );
        (engine, sink)
    }

    fn request(path: &str, input: Value) -> OperationRequest {
        OperationRequest {
            path: path.to_string(),
            input,
        }
    }

    #[tokio::test]
    async fn test_query_delivers_snapshot_and_stays_open() {
        let mut operations = OperationRegistry::new();
        operations.register(OperationDef::query("post.get", |input, _ctx| async move {
            Ok(json!({"id": input["id"], "title": "Hello"}))
        }));
        let (engine, _) = engine_with(operations);

        let mut stream = engine.execute(request("post.get", json!({"id": "p1"})));
        assert_eq!(
            stream.next_event().await,
            Some(StreamEvent::Snapshot {
                data: json!({"id": "p1", "title": "Hello"}),
            })
        );

        // Still open: no complete arrives on its own.
        let pending = tokio::time::timeout(Duration::from_millis(20), stream.next_event()).await;
        assert!(pending.is_err(), "query stream must stay open");

        stream.handle().cancel();
        assert_eq!(stream.next_event().await, Some(StreamEvent::Complete));
    }

    #[tokio::test]
    async fn test_mutation_completes_after_snapshot() {
        let mut operations = OperationRegistry::new();
        operations.register(OperationDef::mutation("post.create", |_input, _ctx| async {
            Ok(json!({"id": "p1"}))
        }));
        let (engine, _) = engine_with(operations);

        let mut stream = engine.execute(request("post.create", json!({})));
        assert!(matches!(
            stream.next_event().await,
            Some(StreamEvent::Snapshot { .. })
        ));
        assert_eq!(stream.next_event().await, Some(StreamEvent::Complete));
    }

    #[tokio::test]
    async fn test_unknown_path_errors() {
        let (engine, _) = engine_with(OperationRegistry::new());
        let mut stream = engine.execute(request("missing.op", json!({})));

        let Some(StreamEvent::Error { code, .. }) = stream.next_event().await else {
            panic!("expected error event");
        };
        assert_eq!(code, "not_found");
        assert_eq!(stream.next_event().await, Some(StreamEvent::Complete));
    }

    #[tokio::test]
    async fn test_validation_failure_errors_before_resolution() {
        let mut operations = OperationRegistry::new();
        operations.register(
            OperationDef::query("post.get", |_input, _ctx| async {
                panic!("resolver must not run")
            })
            .with_validation(|input| {
                input
                    .get("id")
                    .map(|_| ())
                    .ok_or_else(|| "id required".to_string())
            }),
        );
        let (engine, _) = engine_with(operations);

        let mut stream = engine.execute(request("post.get", json!({})));
        let Some(StreamEvent::Error { code, message }) = stream.next_event().await else {
            panic!("expected error event");
        };
        assert_eq!(code, "validation");
        assert!(message.contains("id required"));
        assert_eq!(stream.next_event().await, Some(StreamEvent::Complete));
    }

    #[tokio::test]
    async fn test_select_is_peeled_before_validation_and_projects() {
        let mut operations = OperationRegistry::new();
        operations.register(
            OperationDef::query("post.get", |_input, _ctx| async {
                Ok(json!({"id": "p1", "title": "Hello", "body": "hidden"}))
            })
            .with_validation(|input| {
                // $select must be gone by the time validation runs.
                if input.get(SELECT_KEY).is_some() {
                    Err("selection leaked into validation".into())
                } else {
                    Ok(())
                }
            }),
        );
        let (engine, _) = engine_with(operations);

        let mut stream = engine.execute(request(
            "post.get",
            json!({"id": "p1", "$select": {"title": true}}),
        ));
        assert_eq!(
            stream.next_event().await,
            Some(StreamEvent::Snapshot {
                data: json!({"id": "p1", "title": "Hello"}),
            })
        );
    }

    #[tokio::test]
    async fn test_resolver_error_terminates_stream() {
        let mut operations = OperationRegistry::new();
        operations.register(OperationDef::query("broken", |_input, _ctx| async {
            Err(ResolveError::msg("backend down"))
        }));
        let (engine, _) = engine_with(operations);

        let mut stream = engine.execute(request("broken", json!({})));
        let Some(StreamEvent::Error { code, .. }) = stream.next_event().await else {
            panic!("expected error event");
        };
        assert_eq!(code, "resolver");
        assert_eq!(stream.next_event().await, Some(StreamEvent::Complete));
    }

    #[tokio::test]
    async fn test_stream_operation_yields_one_snapshot_per_value() {
        let mut operations = OperationRegistry::new();
        operations.register(OperationDef::stream("ticks", |_input, _ctx| {
            futures::stream::iter(vec![Ok(json!(1)), Ok(json!(2)), Ok(json!(3))])
        }));
        let (engine, _) = engine_with(operations);

        let mut stream = engine.execute(request("ticks", json!({})));
        for n in 1..=3 {
            assert_eq!(
                stream.next_event().await,
                Some(StreamEvent::Snapshot { data: json!(n) })
            );
        }
        assert_eq!(stream.next_event().await, Some(StreamEvent::Complete));
    }

    #[tokio::test]
    async fn test_live_operation_publishes_ops() {
        let mut operations = OperationRegistry::new();
        operations.register(OperationDef::live(
            "counter.watch",
            |_input, _ctx| async { Ok(json!({"count": 0})) },
            |emit, _cleanups, _ctx| {
                emit(EmitCommand::Field {
                    field: "count".into(),
                    update: lens_codec_update(json!(1)),
                });
            },
        ));
        let (engine, _) = engine_with(operations);

        let mut stream = engine.execute(request("counter.watch", json!({})));
        assert_eq!(
            stream.next_event().await,
            Some(StreamEvent::Snapshot {
                data: json!({"count": 0}),
            })
        );
        let Some(StreamEvent::Ops { commands }) = stream.next_event().await else {
            panic!("expected ops event");
        };
        assert_eq!(
            commands,
            vec![EmitCommand::Field {
                field: "count".into(),
                update: lens_codec_update(json!(1)),
            }]
        );
    }

    #[tokio::test]
    async fn test_live_field_ops_are_path_prefixed() {
        let mut schema = SchemaRegistry::new();
        schema.register(EntityDef::new("Post").expose("id").live(
            "viewers",
            |_parent| async { Ok(json!(0)) },
            |emit, _cleanups| {
                emit(EmitCommand::Full {
                    data: json!(7),
                    replace: true,
                });
            },
        ));

        let mut operations = OperationRegistry::new();
        operations.register(OperationDef::query("post.get", |_input, _ctx| async {
            Ok(json!({"__typename": "Post", "id": "p1"}))
        }));

        let engine = ExecutionEngine::new(
            operations,
            schema,
            Arc::new(RecordingSink::default()),
            ResolveConfig::default(),
        );

        let mut stream = engine.execute(request("post.get", json!({})));
        let Some(StreamEvent::Ops { commands }) = stream.next_event().await else {
            panic!("expected ops before snapshot (publisher fires at start)");
        };
        assert_eq!(
            commands,
            vec![EmitCommand::Field {
                field: "viewers".into(),
                update: lens_codec_update(json!(7)),
            }]
        );
        assert!(matches!(
            stream.next_event().await,
            Some(StreamEvent::Snapshot { .. })
        ));
    }

    #[tokio::test]
    async fn test_ctx_emit_reaches_sink() {
        let mut operations = OperationRegistry::new();
        operations.register(OperationDef::mutation("post.update", |input, ctx| async move {
            ctx.emit(
                "Post",
                input["id"].as_str().unwrap_or(""),
                EmitCommand::Full {
                    data: json!({"title": "New"}),
                    replace: false,
                },
            )
            .map_err(|e| ResolveError::msg(e.to_string()))?;
            Ok(json!({"ok": true}))
        }));
        let (engine, sink) = engine_with(operations);

        let mut stream = engine.execute(request("post.update", json!({"id": "p1"})));
        assert!(matches!(
            stream.next_event().await,
            Some(StreamEvent::Snapshot { .. })
        ));
        assert_eq!(stream.next_event().await, Some(StreamEvent::Complete));

        let recorded = sink.0.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "Post");
        assert_eq!(recorded[0].1, "p1");
    }

    #[tokio::test]
    async fn test_cancel_runs_cleanup_hooks_in_reverse() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let seen = order.clone();

        let mut operations = OperationRegistry::new();
        operations.register(OperationDef::live(
            "watch",
            |_input, _ctx| async { Ok(json!(null)) },
            move |_emit, cleanups, _ctx| {
                let first = seen.clone();
                cleanups.register(move || first.lock().unwrap().push("first"));
                let second = seen.clone();
                cleanups.register(move || second.lock().unwrap().push("second"));
            },
        ));
        let (engine, _) = engine_with(operations);

        let mut stream = engine.execute(request("watch", json!({})));
        assert!(matches!(
            stream.next_event().await,
            Some(StreamEvent::Snapshot { .. })
        ));

        stream.handle().cancel();
        stream.handle().cancel();
        assert_eq!(*order.lock().unwrap(), vec!["second", "first"]);
    }

    fn lens_codec_update(value: Value) -> lens_codec::Update {
        lens_codec::Update::Value(value)
    }
}
