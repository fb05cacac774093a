//! Message dispatch and per-client plumbing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use lens_command::CommandSink;
use lens_engine::{
    ExecutionEngine, OperationHandle, OperationRegistry, OperationRequest, StreamEvent,
};
use lens_resolve::{ResolveConfig, SchemaRegistry};
use lens_state::{ClientId, FieldSet, GraphStateManager, SendError, StateError, StatePolicy};
use lens_value::Value;
use lens_wire::{
    ClientMessage, ErrorPayload, HandshakeData, PROTOCOL_VERSION, ReconnectSubscription,
    ServerMessage, decode_client_message,
};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

/// Per-connection bookkeeping: the ordered outbound queue and the handles
/// of operations this client has running.
struct ClientConn {
    outbound: mpsc::UnboundedSender<ServerMessage>,
    operations: Mutex<FxHashMap<String, OperationHandle>>,
}

/// The server core: owns the engine and the graph state manager, and
/// fronts both for transports.
pub struct LensServer {
    engine: ExecutionEngine,
    state: Arc<GraphStateManager>,
    clients: DashMap<ClientId, ClientConn>,
    next_client: AtomicU64,
}

impl LensServer {
    /// Wires a server: the state manager becomes the engine's command
    /// sink, so resolver emits fan out to entity subscribers.
    pub fn new(
        operations: OperationRegistry,
        schema: SchemaRegistry,
        policy: StatePolicy,
        resolve: ResolveConfig,
    ) -> Arc<Self> {
        let state = Arc::new(GraphStateManager::new(policy));
        let sink: Arc<dyn CommandSink> = state.clone();
        let engine = ExecutionEngine::new(operations, schema, sink, resolve);
        Arc::new(Self {
            engine,
            state,
            clients: DashMap::new(),
            next_client: AtomicU64::new(1),
        })
    }

    /// The graph state manager (embedding code emits through this).
    pub fn state(&self) -> &Arc<GraphStateManager> {
        &self.state
    }

    /// Registers a connection. The transport must drain the returned
    /// queue in order; dropping it counts as a dead transport and evicts
    /// the client on the next send.
    pub fn connect(&self) -> (ClientId, mpsc::UnboundedReceiver<ServerMessage>) {
        let client = ClientId(self.next_client.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.insert(
            client,
            ClientConn {
                outbound: tx.clone(),
                operations: Mutex::new(FxHashMap::default()),
            },
        );

        let queue = tx;
        self.state.add_client(
            client,
            Arc::new(move |_, message: &ServerMessage| {
                queue
                    .send(message.clone())
                    .map_err(|_| SendError("client outbound queue closed".into()))
            }),
        );
        tracing::debug!(%client, "client connected");
        (client, rx)
    }

    /// Tears down a connection: cancels running operations (their cleanup
    /// hooks run) and removes every subscription. Idempotent.
    pub fn disconnect(&self, client: ClientId) {
        if let Some((_, conn)) = self.clients.remove(&client) {
            let handles: Vec<OperationHandle> = match conn.operations.lock() {
                Ok(mut operations) => operations.drain().map(|(_, handle)| handle).collect(),
                Err(_) => Vec::new(),
            };
            for handle in handles {
                handle.cancel();
            }
        }
        self.state.remove_client(client);
        tracing::debug!(%client, "client disconnected");
    }

    /// Number of live connections.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Subscribes a connected client to an entity. Embedding code calls
    /// this when an operation's results reference entities the client
    /// should track.
    pub fn subscribe_entity(
        &self,
        client: ClientId,
        entity: &str,
        id: &str,
        fields: FieldSet,
    ) -> Result<(), StateError> {
        self.state.subscribe(client, entity, id, fields)
    }

    /// Removes an entity subscription.
    pub fn unsubscribe_entity(&self, client: ClientId, entity: &str, id: &str) {
        self.state.unsubscribe(client, entity, id);
    }

    /// Entry point for transports: one inbound frame's bytes.
    pub fn handle_message(self: &Arc<Self>, client: ClientId, bytes: &[u8]) {
        match decode_client_message(bytes) {
            Ok(message) => self.dispatch(client, message),
            Err(error) => {
                tracing::debug!(%client, %error, "undecodable client message");
                self.send_to(
                    client,
                    ServerMessage::Error {
                        id: None,
                        error: ErrorPayload::coded(error.to_string(), "bad_message"),
                    },
                );
            }
        }
    }

    fn dispatch(self: &Arc<Self>, client: ClientId, message: ClientMessage) {
        match message {
            ClientMessage::Handshake => {
                self.send_to(
                    client,
                    ServerMessage::Handshake {
                        data: HandshakeData {
                            version: PROTOCOL_VERSION,
                            operations: self.engine.operation_paths(),
                            entities: self.engine.entity_names(),
                        },
                    },
                );
            }
            ClientMessage::Ping => {
                self.send_to(client, ServerMessage::Pong { server_time: now_ms() });
            }
            ClientMessage::Operation {
                id,
                path,
                op_type: _,
                input,
            } => {
                // First snapshot answers as a response; later events use
                // the subscription envelope.
                self.start_operation(client, id, path, input, true);
            }
            ClientMessage::Subscription { id, path, input } => {
                self.start_operation(client, id, path, input, false);
            }
            ClientMessage::Unsubscribe { id } => {
                let handle = self.clients.get(&client).and_then(|conn| {
                    conn.operations
                        .lock()
                        .ok()
                        .and_then(|mut operations| operations.remove(&id))
                });
                match handle {
                    Some(handle) => handle.cancel(),
                    None => tracing::debug!(%client, op = %id, "unsubscribe for unknown operation"),
                }
            }
            ClientMessage::Reconnect {
                protocol_version,
                reconnect_id,
                subscriptions,
                client_time: _,
            } => {
                self.handle_reconnect(client, protocol_version, reconnect_id, subscriptions);
            }
        }
    }

    fn start_operation(
        self: &Arc<Self>,
        client: ClientId,
        op_id: String,
        path: String,
        input: Value,
        first_is_response: bool,
    ) {
        let mut stream = self.engine.execute(OperationRequest { path, input });
        if let Some(conn) = self.clients.get(&client) {
            if let Ok(mut operations) = conn.operations.lock() {
                operations.insert(op_id.clone(), stream.handle());
            }
        }

        let server = self.clone();
        tokio::spawn(async move {
            let mut first = true;
            while let Some(event) = stream.next_event().await {
                let delivered = match event {
                    StreamEvent::Snapshot { data } => {
                        let message = if first && first_is_response {
                            ServerMessage::Response {
                                id: op_id.clone(),
                                data: Some(data),
                                error: None,
                            }
                        } else {
                            ServerMessage::Subscription {
                                id: op_id.clone(),
                                data: Some(data),
                                update: None,
                                version: None,
                                error: None,
                            }
                        };
                        first = false;
                        server.send_to(client, message)
                    }
                    StreamEvent::Ops { commands } => commands.into_iter().all(|command| {
                        server.send_to(
                            client,
                            ServerMessage::Subscription {
                                id: op_id.clone(),
                                data: None,
                                update: Some(command),
                                version: None,
                                error: None,
                            },
                        )
                    }),
                    StreamEvent::Error { message, code } => {
                        let payload = ErrorPayload::coded(message, code);
                        let message = if first && first_is_response {
                            ServerMessage::Response {
                                id: op_id.clone(),
                                data: None,
                                error: Some(payload),
                            }
                        } else {
                            ServerMessage::Subscription {
                                id: op_id.clone(),
                                data: None,
                                update: None,
                                version: None,
                                error: Some(payload),
                            }
                        };
                        first = false;
                        server.send_to(client, message)
                    }
                    StreamEvent::Complete => break,
                };
                if !delivered {
                    stream.handle().cancel();
                    break;
                }
            }
            if let Some(conn) = server.clients.get(&client) {
                if let Ok(mut operations) = conn.operations.lock() {
                    operations.remove(&op_id);
                }
            }
        });
    }

    fn handle_reconnect(
        &self,
        client: ClientId,
        protocol_version: u32,
        reconnect_id: String,
        subscriptions: Vec<ReconnectSubscription>,
    ) {
        if protocol_version != PROTOCOL_VERSION {
            self.send_to(
                client,
                ServerMessage::Error {
                    id: Some(reconnect_id),
                    error: ErrorPayload::coded(
                        format!("unsupported protocol version {protocol_version}"),
                        "protocol",
                    ),
                },
            );
            return;
        }

        let started = Instant::now();
        let results = self.state.resolve_reconnect(&subscriptions);
        tracing::debug!(
            %client,
            claims = subscriptions.len(),
            "reconnect resolved"
        );
        self.send_to(
            client,
            ServerMessage::ReconnectAck {
                reconnect_id,
                results,
                server_time: now_ms(),
                processing_time: started.elapsed().as_secs_f64() * 1000.0,
            },
        );
    }

    fn send_to(&self, client: ClientId, message: ServerMessage) -> bool {
        match self.clients.get(&client) {
            Some(conn) => conn.outbound.send(message).is_ok(),
            None => false,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
