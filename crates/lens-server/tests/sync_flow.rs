//! End-to-end flows through the server core: subscribe/emit fan-out,
//! hydration, operations over the wire, reconnect recovery, and the
//! client mirror applying everything the server sends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use lens_client::MirrorStore;
use lens_codec::Update;
use lens_command::{EmitCommand, FieldUpdate};
use lens_engine::{OperationDef, OperationRegistry};
use lens_oplog::LogConfig;
use lens_resolve::{ResolveConfig, ResolveError, SchemaRegistry};
use lens_server::LensServer;
use lens_state::{ClientId, FieldSet, StatePolicy};
use lens_value::Value;
use lens_wire::{
    ClientMessage, FieldSpec, OpKind, PROTOCOL_VERSION, ReconnectStatus, ReconnectSubscription,
    ServerMessage, encode_message,
};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

fn test_operations() -> OperationRegistry {
    let mut operations = OperationRegistry::new();
    operations.register(OperationDef::query("post.get", |input, _ctx| async move {
        Ok(json!({"id": input["id"], "title": "Hello", "body": "hi"}))
    }));
    operations.register(OperationDef::mutation(
        "post.update",
        |input, ctx| async move {
            let id = input["id"].as_str().unwrap_or_default().to_string();
            ctx.emit(
                "Post",
                &id,
                EmitCommand::Full {
                    data: input["data"].clone(),
                    replace: false,
                },
            )
            .map_err(|e| ResolveError::msg(e.to_string()))?;
            Ok(json!({"ok": true}))
        },
    ));
    operations
}

fn server() -> Arc<LensServer> {
    LensServer::new(
        test_operations(),
        SchemaRegistry::new(),
        StatePolicy::default(),
        ResolveConfig::default(),
    )
}

fn server_with_policy(policy: StatePolicy) -> Arc<LensServer> {
    LensServer::new(
        test_operations(),
        SchemaRegistry::new(),
        policy,
        ResolveConfig::default(),
    )
}

async fn recv(rx: &mut UnboundedReceiver<ServerMessage>) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for server message")
        .expect("outbound queue closed")
}

async fn assert_silent(rx: &mut UnboundedReceiver<ServerMessage>) {
    let pending = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(pending.is_err(), "expected silence, got {:?}", pending.unwrap());
}

fn send(server: &Arc<LensServer>, client: ClientId, message: &ClientMessage) {
    let bytes = encode_message(message).unwrap();
    server.handle_message(client, &bytes);
}

#[tokio::test]
async fn test_subscribe_then_emit_minimal_update() {
    let server = server();
    let (c1, mut rx) = server.connect();
    server
        .subscribe_entity(c1, "Post", "p1", FieldSet::named(["title"]))
        .unwrap();

    server
        .state()
        .emit("Post", "p1", json!({"title": "Hello", "body": "hi"}), false)
        .unwrap();

    let message = recv(&mut rx).await;
    assert_eq!(
        serde_json::to_value(&message).unwrap(),
        json!({
            "type": "update",
            "entity": "Post",
            "id": "p1",
            "version": 1,
            "updates": {"title": {"strategy": "value", "data": "Hello"}},
        })
    );
    assert_silent(&mut rx).await;
}

#[tokio::test]
async fn test_hydrate_on_late_subscribe() {
    let server = server();
    server
        .state()
        .emit("Post", "p1", json!({"title": "Hello"}), false)
        .unwrap();

    let (c2, mut rx) = server.connect();
    server
        .subscribe_entity(c2, "Post", "p1", FieldSet::All)
        .unwrap();

    let ServerMessage::Update {
        version, updates, ..
    } = recv(&mut rx).await
    else {
        panic!("expected hydration update");
    };
    assert_eq!(version, 1);
    assert_eq!(updates["title"], Update::Value(json!("Hello")));
}

#[tokio::test]
async fn test_idempotent_emit_sends_nothing() {
    let server = server();
    let (c1, mut rx) = server.connect();
    server
        .subscribe_entity(c1, "Post", "p1", FieldSet::All)
        .unwrap();
    server
        .state()
        .emit("Post", "p1", json!({"title": "Hello"}), false)
        .unwrap();
    recv(&mut rx).await;

    server
        .state()
        .emit("Post", "p1", json!({"title": "Hello"}), false)
        .unwrap();
    assert_silent(&mut rx).await;
    assert_eq!(server.state().get_version("Post", "p1"), 1);
}

#[tokio::test]
async fn test_batch_respects_field_subscription() {
    let server = server();
    let (c1, mut rx) = server.connect();
    server
        .subscribe_entity(c1, "User", "u1", FieldSet::named(["name"]))
        .unwrap();

    server
        .state()
        .emit_batch(
            "User",
            "u1",
            vec![
                FieldUpdate {
                    field: "name".into(),
                    update: Update::Value(json!("A")),
                },
                FieldUpdate {
                    field: "email".into(),
                    update: Update::Value(json!("a@x")),
                },
            ],
        )
        .unwrap();

    let ServerMessage::Update {
        version, updates, ..
    } = recv(&mut rx).await
    else {
        panic!("expected update");
    };
    assert_eq!(version, 1);
    assert_eq!(updates.len(), 1);
    assert!(updates.contains_key("name"));
}

#[tokio::test]
async fn test_handshake_lists_catalog() {
    let server = server();
    let (c1, mut rx) = server.connect();
    send(&server, c1, &ClientMessage::Handshake);

    let ServerMessage::Handshake { data } = recv(&mut rx).await else {
        panic!("expected handshake reply");
    };
    assert_eq!(data.version, PROTOCOL_VERSION);
    assert_eq!(data.operations, vec!["post.get", "post.update"]);
}

#[tokio::test]
async fn test_ping_pong() {
    let server = server();
    let (c1, mut rx) = server.connect();
    send(&server, c1, &ClientMessage::Ping);
    assert!(matches!(recv(&mut rx).await, ServerMessage::Pong { .. }));
}

#[tokio::test]
async fn test_operation_answers_with_response() {
    let server = server();
    let (c1, mut rx) = server.connect();
    send(
        &server,
        c1,
        &ClientMessage::Operation {
            id: "op-1".into(),
            path: "post.get".into(),
            op_type: OpKind::Query,
            input: json!({"id": "p1", "$select": {"title": true}}),
        },
    );

    let ServerMessage::Response { id, data, error } = recv(&mut rx).await else {
        panic!("expected response");
    };
    assert_eq!(id, "op-1");
    assert!(error.is_none());
    assert_eq!(data, Some(json!({"id": "p1", "title": "Hello"})));
}

#[tokio::test]
async fn test_unknown_path_answers_with_error_response() {
    let server = server();
    let (c1, mut rx) = server.connect();
    send(
        &server,
        c1,
        &ClientMessage::Operation {
            id: "op-9".into(),
            path: "no.such.op".into(),
            op_type: OpKind::Query,
            input: Value::Null,
        },
    );

    let ServerMessage::Response { id, data, error } = recv(&mut rx).await else {
        panic!("expected response");
    };
    assert_eq!(id, "op-9");
    assert!(data.is_none());
    assert_eq!(error.unwrap().code.as_deref(), Some("not_found"));
}

#[tokio::test]
async fn test_mutation_emits_fan_out_to_subscribers() {
    let server = server();
    let (viewer, mut viewer_rx) = server.connect();
    server
        .subscribe_entity(viewer, "Post", "p1", FieldSet::All)
        .unwrap();

    let (writer, mut writer_rx) = server.connect();
    send(
        &server,
        writer,
        &ClientMessage::Operation {
            id: "m-1".into(),
            path: "post.update".into(),
            op_type: OpKind::Mutation,
            input: json!({"id": "p1", "data": {"title": "Updated"}}),
        },
    );

    // The writer gets its response; the viewer gets the entity update.
    assert!(matches!(
        recv(&mut writer_rx).await,
        ServerMessage::Response { .. }
    ));
    let ServerMessage::Update { updates, .. } = recv(&mut viewer_rx).await else {
        panic!("expected fan-out update");
    };
    assert_eq!(updates["title"], Update::Value(json!("Updated")));
}

#[tokio::test]
async fn test_malformed_bytes_answer_with_error() {
    let server = server();
    let (c1, mut rx) = server.connect();
    server.handle_message(c1, b"{definitely not json");

    let ServerMessage::Error { error, .. } = recv(&mut rx).await else {
        panic!("expected error message");
    };
    assert_eq!(error.code.as_deref(), Some("bad_message"));
}

#[tokio::test]
async fn test_reconnect_patched_path_brings_mirror_current() {
    let server = server();
    let (c1, mut rx) = server.connect();
    server
        .subscribe_entity(c1, "Post", "p1", FieldSet::All)
        .unwrap();

    // Version 1 reaches the client's mirror.
    server
        .state()
        .emit("Post", "p1", json!({"title": "v1"}), false)
        .unwrap();
    let mut mirror = MirrorStore::new();
    let ServerMessage::Update {
        entity,
        id,
        version,
        updates,
    } = recv(&mut rx).await
    else {
        panic!("expected update");
    };
    mirror.apply_update(&entity, &id, version, &updates).unwrap();

    // Versions 2..4 happen while the client is "offline".
    for n in 2..=4 {
        server
            .state()
            .emit("Post", "p1", json!({"title": format!("v{n}"), "n": n}), false)
            .unwrap();
        recv(&mut rx).await; // drained, deliberately not applied
    }

    // Reconnect with the mirror's claims.
    send(
        &server,
        c1,
        &ClientMessage::Reconnect {
            protocol_version: PROTOCOL_VERSION,
            reconnect_id: "r-1".into(),
            subscriptions: mirror.reconnect_subscriptions(),
            client_time: 0,
        },
    );

    let ServerMessage::ReconnectAck {
        reconnect_id,
        results,
        ..
    } = recv(&mut rx).await
    else {
        panic!("expected reconnect ack");
    };
    assert_eq!(reconnect_id, "r-1");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, ReconnectStatus::Patched);
    assert_eq!(results[0].patches.as_ref().unwrap().len(), 3);

    mirror.apply_reconnect_result(&results[0]).unwrap();
    assert_eq!(
        mirror.get("Post", "p1"),
        server.state().canonical_state("Post", "p1").as_ref()
    );
    assert_eq!(mirror.version("Post", "p1"), 4);

    // A second reconnect from the repaired mirror is current.
    send(
        &server,
        c1,
        &ClientMessage::Reconnect {
            protocol_version: PROTOCOL_VERSION,
            reconnect_id: "r-2".into(),
            subscriptions: mirror.reconnect_subscriptions(),
            client_time: 0,
        },
    );
    let ServerMessage::ReconnectAck { results, .. } = recv(&mut rx).await else {
        panic!("expected second ack");
    };
    assert_eq!(results[0].status, ReconnectStatus::Current);
}

#[tokio::test]
async fn test_reconnect_snapshot_path_after_eviction() {
    let policy = StatePolicy {
        log: LogConfig {
            max_entries: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    let server = server_with_policy(policy);
    let (c1, mut rx) = server.connect();

    for n in 1..=5 {
        server
            .state()
            .emit("Post", "p1", json!({"n": n}), false)
            .unwrap();
    }

    send(
        &server,
        c1,
        &ClientMessage::Reconnect {
            protocol_version: PROTOCOL_VERSION,
            reconnect_id: "r-1".into(),
            subscriptions: vec![ReconnectSubscription {
                id: "s1".into(),
                entity: "Post".into(),
                entity_id: "p1".into(),
                fields: FieldSpec::all(),
                version: 1,
                data_hash: None,
            }],
            client_time: 0,
        },
    );

    let ServerMessage::ReconnectAck { results, .. } = recv(&mut rx).await else {
        panic!("expected reconnect ack");
    };
    assert_eq!(results[0].status, ReconnectStatus::Snapshot);
    assert_eq!(results[0].version, 5);

    let mut mirror = MirrorStore::new();
    mirror.apply_reconnect_result(&results[0]).unwrap();
    assert_eq!(mirror.get("Post", "p1"), Some(&json!({"n": 5})));

    // The downgrade happens exactly once: after the resync, a reconnect
    // from the repaired mirror is current.
    send(
        &server,
        c1,
        &ClientMessage::Reconnect {
            protocol_version: PROTOCOL_VERSION,
            reconnect_id: "r-2".into(),
            subscriptions: mirror.reconnect_subscriptions(),
            client_time: 0,
        },
    );
    let ServerMessage::ReconnectAck { results, .. } = recv(&mut rx).await else {
        panic!("expected second ack");
    };
    assert_eq!(results[0].status, ReconnectStatus::Current);
}

#[tokio::test]
async fn test_reconnect_rejects_wrong_protocol_version() {
    let server = server();
    let (c1, mut rx) = server.connect();
    send(
        &server,
        c1,
        &ClientMessage::Reconnect {
            protocol_version: 99,
            reconnect_id: "r-1".into(),
            subscriptions: vec![],
            client_time: 0,
        },
    );

    let ServerMessage::Error { id, error } = recv(&mut rx).await else {
        panic!("expected error");
    };
    assert_eq!(id.as_deref(), Some("r-1"));
    assert_eq!(error.code.as_deref(), Some("protocol"));
}

#[tokio::test]
async fn test_unsubscribe_cancels_live_operation() {
    let cleaned = Arc::new(AtomicBool::new(false));
    let flag = cleaned.clone();

    let mut operations = OperationRegistry::new();
    operations.register(OperationDef::live(
        "counter.watch",
        |_input, _ctx| async { Ok(json!({"count": 0})) },
        move |_emit, cleanups, _ctx| {
            let flag = flag.clone();
            cleanups.register(move || flag.store(true, Ordering::SeqCst));
        },
    ));
    let server = LensServer::new(
        operations,
        SchemaRegistry::new(),
        StatePolicy::default(),
        ResolveConfig::default(),
    );

    let (c1, mut rx) = server.connect();
    send(
        &server,
        c1,
        &ClientMessage::Subscription {
            id: "sub-1".into(),
            path: "counter.watch".into(),
            input: Value::Null,
        },
    );
    let ServerMessage::Subscription { id, data, .. } = recv(&mut rx).await else {
        panic!("expected subscription snapshot");
    };
    assert_eq!(id, "sub-1");
    assert_eq!(data, Some(json!({"count": 0})));

    send(&server, c1, &ClientMessage::Unsubscribe { id: "sub-1".into() });
    tokio::time::timeout(Duration::from_secs(1), async {
        while !cleaned.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("cleanup hook should run on unsubscribe");
}

#[tokio::test]
async fn test_disconnect_stops_all_delivery() {
    let server = server();
    let (c1, mut rx) = server.connect();
    server
        .subscribe_entity(c1, "Post", "p1", FieldSet::All)
        .unwrap();

    server.disconnect(c1);
    server.disconnect(c1); // idempotent

    server
        .state()
        .emit("Post", "p1", json!({"title": "Hello"}), false)
        .unwrap();
    assert!(
        rx.recv().await.is_none(),
        "queue must close once the client is gone"
    );
    assert_eq!(server.client_count(), 0);
    assert_eq!(server.state().stats().subscriptions, 0);
}
