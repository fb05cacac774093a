//! Client → server and server → client message envelopes.

use std::collections::BTreeMap;

use lens_codec::Update;
use lens_command::EmitCommand;
use lens_value::Value;
use serde::{Deserialize, Serialize};

use crate::{ReconnectResult, ReconnectSubscription, WireError};

/// Current wire-protocol version, reported in the handshake and checked on
/// reconnect.
pub const PROTOCOL_VERSION: u32 = 1;

/// Whether an operation reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// Read-only; the result stream stays open for live updates.
    Query,
    /// State-changing; the result stream completes after the snapshot.
    Mutation,
}

/// Messages a transport delivers to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Capability probe; answered with the operation/entity catalog.
    Handshake,
    /// Execute a query or mutation.
    #[serde(rename_all = "camelCase")]
    Operation {
        /// Caller-chosen id echoed in every reply.
        id: String,
        /// Registered operation path.
        path: String,
        /// Query or mutation.
        op_type: OpKind,
        /// Operation input; `$select` is peeled off before validation.
        #[serde(default)]
        input: Value,
    },
    /// Subscribe to a live operation.
    Subscription {
        /// Caller-chosen id echoed in every reply.
        id: String,
        /// Registered operation path.
        path: String,
        /// Operation input.
        #[serde(default)]
        input: Value,
    },
    /// End a subscription or live query stream.
    Unsubscribe {
        /// The id used when the stream was started.
        id: String,
    },
    /// Batch recovery after a connection loss.
    #[serde(rename_all = "camelCase")]
    Reconnect {
        /// Protocol version the client speaks.
        protocol_version: u32,
        /// Caller-chosen id echoed in the ack.
        reconnect_id: String,
        /// The client's view of each subscription it held.
        subscriptions: Vec<ReconnectSubscription>,
        /// Client wall clock, Unix milliseconds.
        client_time: u64,
    },
    /// Keepalive; answered with a pong.
    Ping,
}

/// Messages the server hands to a transport for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake reply.
    Handshake {
        /// Protocol version and catalog.
        data: HandshakeData,
    },
    /// Operation result (exactly one per `operation` request).
    Response {
        /// Echo of the request id.
        id: String,
        /// Result data when the operation succeeded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        /// Error when it failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorPayload>,
    },
    /// Streaming result for subscriptions and live queries.
    Subscription {
        /// Echo of the request id.
        id: String,
        /// A full snapshot of the operation result.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        /// An incremental change to apply to the previous snapshot.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        update: Option<EmitCommand>,
        /// Entity version, when the update maps to one entity.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u64>,
        /// Terminal error for this stream.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorPayload>,
    },
    /// Entity state update fanned out by the graph state manager.
    Update {
        /// Entity type name.
        entity: String,
        /// Entity instance id.
        id: String,
        /// Entity version after this update.
        version: u64,
        /// Per-field updates, keyed by field name.
        updates: BTreeMap<String, Update>,
    },
    /// Reply to a reconnect batch.
    #[serde(rename_all = "camelCase")]
    ReconnectAck {
        /// Echo of the reconnect id.
        reconnect_id: String,
        /// One result per claimed subscription, in request order.
        results: Vec<ReconnectResult>,
        /// Server wall clock, Unix milliseconds.
        server_time: u64,
        /// Milliseconds spent resolving the batch.
        processing_time: f64,
    },
    /// Keepalive reply.
    #[serde(rename_all = "camelCase")]
    Pong {
        /// Server wall clock, Unix milliseconds.
        server_time: u64,
    },
    /// Protocol-level error.
    Error {
        /// The request id this error belongs to, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// What went wrong.
        error: ErrorPayload,
    },
}

/// Handshake catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeData {
    /// Protocol version the server speaks.
    pub version: u32,
    /// Registered operation paths.
    pub operations: Vec<String>,
    /// Registered entity type names.
    pub entities: Vec<String>,
}

/// Error detail carried inside replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable description.
    pub message: String,
    /// Machine-readable code, when one applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorPayload {
    /// Builds a payload with just a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Builds a payload with a message and code.
    pub fn coded(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

/// Serializes any wire message to JSON bytes.
pub fn encode_message<T: Serialize>(message: &T) -> Result<Vec<u8>, WireError> {
    Ok(serde_json::to_vec(message)?)
}

/// Parses bytes from a transport into a [`ClientMessage`].
pub fn decode_client_message(bytes: &[u8]) -> Result<ClientMessage, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Parses bytes from a transport into a [`ServerMessage`].
pub fn decode_server_message(bytes: &[u8]) -> Result<ServerMessage, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}
