//! Conditional LZ4 compression for reconnect snapshots.
//!
//! Small snapshots ship as plain JSON; snapshots whose serialized size
//! crosses the threshold ship as a [`CompressedPayload`] the client
//! decompresses before applying.

use lens_value::Value;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};

use crate::WireError;

/// Encoding name carried inside compressed payloads.
const ENCODING_LZ4: &str = "lz4";

/// Controls when snapshots are compressed.
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Minimum serialized size (bytes) before compression applies.
    /// Default: 1024.
    pub threshold: usize,
    /// Whether compression is enabled at all. Default: true.
    pub enabled: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            threshold: 1024,
            enabled: true,
        }
    }
}

/// A compressed snapshot body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedPayload {
    /// Compression scheme; currently always `"lz4"`.
    pub encoding: String,
    /// Serialized size before compression, for sanity checks.
    pub original_size: u64,
    /// The compressed bytes (size-prepended LZ4 block).
    pub data: Vec<u8>,
}

/// Snapshot state as it travels inside a reconnect result: raw, or wrapped
/// in a compression envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotData {
    /// Compressed envelope (tried first when decoding).
    Compressed(CompressedPayload),
    /// Raw state.
    Plain(Value),
}

/// Wraps `state` for the wire, compressing when its serialized size is at
/// least the configured threshold.
pub fn compress_snapshot(
    state: &Value,
    config: &CompressionConfig,
) -> Result<SnapshotData, WireError> {
    let serialized = serde_json::to_vec(state)?;
    if !config.enabled || serialized.len() < config.threshold {
        return Ok(SnapshotData::Plain(state.clone()));
    }
    let compressed = compress_prepend_size(&serialized);
    Ok(SnapshotData::Compressed(CompressedPayload {
        encoding: ENCODING_LZ4.to_string(),
        original_size: serialized.len() as u64,
        data: compressed,
    }))
}

/// Unwraps snapshot data, decompressing if necessary.
pub fn decompress_snapshot(data: &SnapshotData) -> Result<Value, WireError> {
    match data {
        SnapshotData::Plain(state) => Ok(state.clone()),
        SnapshotData::Compressed(payload) => {
            if payload.encoding != ENCODING_LZ4 {
                return Err(WireError::UnknownEncoding(payload.encoding.clone()));
            }
            let serialized = decompress_size_prepended(&payload.data)
                .map_err(|e| WireError::Decompress(e.to_string()))?;
            Ok(serde_json::from_slice(&serialized)?)
        }
    }
}
