//! Wire protocol: message envelopes as observed by transports.
//!
//! All messages are JSON objects tagged by a `type` field. Transports frame
//! and move the bytes; this crate only defines the shapes and the
//! encode/decode helpers.

mod compression;
mod messages;
mod reconnect;

pub use compression::{
    CompressedPayload, CompressionConfig, SnapshotData, compress_snapshot, decompress_snapshot,
};
pub use messages::{
    ClientMessage, ErrorPayload, HandshakeData, OpKind, PROTOCOL_VERSION, ServerMessage,
    decode_client_message, decode_server_message, encode_message,
};
pub use reconnect::{FieldSpec, ReconnectResult, ReconnectStatus, ReconnectSubscription};

/// Errors from encoding, decoding, or decompressing wire payloads.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// JSON (de)serialization failed.
    #[error("message (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A compressed snapshot could not be decompressed.
    #[error("snapshot decompression failed: {0}")]
    Decompress(String),

    /// A compressed snapshot used an encoding this build does not know.
    #[error("unknown snapshot encoding {0:?}")]
    UnknownEncoding(String),
}
