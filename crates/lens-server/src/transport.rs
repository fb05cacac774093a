//! Length-prefixed TCP transport.
//!
//! Every message on the wire is a frame: a `u32` little-endian payload
//! length, then that many bytes of JSON. A zero-length frame is a valid
//! no-op (keepalive padding). One writer task per connection drains the
//! client's ordered outbound queue.

use std::net::SocketAddr;
use std::sync::Arc;

use lens_wire::encode_message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::watch;

use crate::LensServer;

/// Configuration for the framing layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum allowed payload size in bytes. Default: 1 MB.
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 1_048_576,
        }
    }
}

/// Errors that can occur during framing operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload size exceeds the configured maximum.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// The actual payload size.
        size: u32,
        /// The configured maximum.
        max: u32,
    },

    /// The connection was closed before a complete frame was received.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read a single length-prefixed frame from the stream.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::ConnectionClosed);
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let payload_len = u32::from_le_bytes(len_buf);
    if payload_len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: config.max_payload_size,
        });
    }

    let mut payload = vec![0u8; payload_len as usize];
    if payload_len > 0 {
        reader.read_exact(&mut payload).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                FrameError::ConnectionClosed
            } else {
                FrameError::Io(e)
            }
        })?;
    }
    Ok(payload)
}

/// Write a single length-prefixed frame to the stream.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let len = payload.len() as u32;
    if len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: config.max_payload_size,
        });
    }

    writer.write_all(&len.to_le_bytes()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Configuration for [`TcpTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Address to bind.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Framing limits.
    pub frame: FrameConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7810)),
            max_connections: 256,
            frame: FrameConfig::default(),
        }
    }
}

/// TCP adapter over the server core.
pub struct TcpTransport {
    server: Arc<LensServer>,
    config: TransportConfig,
    shutdown_tx: watch::Sender<bool>,
}

impl TcpTransport {
    /// Creates a transport for the given server.
    pub fn new(server: Arc<LensServer>, config: TransportConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            server,
            config,
            shutdown_tx,
        }
    }

    /// Binds and serves until [`TcpTransport::shutdown`] is called.
    pub async fn serve(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "listening");
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    if self.server.client_count() >= self.config.max_connections {
                        tracing::warn!(%peer, "connection limit reached; refusing");
                        continue;
                    }
                    let server = self.server.clone();
                    let frame = self.config.frame.clone();
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        handle_connection(server, reader, writer, frame).await;
                    });
                }
            }
        }
        Ok(())
    }

    /// Signals the accept loop to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn handle_connection(
    server: Arc<LensServer>,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    frame: FrameConfig,
) {
    let (client, mut outbound) = server.connect();

    let writer_frame = frame.clone();
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let bytes = match encode_message(&message) {
                Ok(bytes) => bytes,
                Err(error) => {
                    tracing::error!(%error, "unencodable outbound message");
                    continue;
                }
            };
            if write_frame(&mut writer, &bytes, &writer_frame).await.is_err() {
                break;
            }
        }
    });

    loop {
        match read_frame(&mut reader, &frame).await {
            Ok(payload) if payload.is_empty() => {} // keepalive padding
            Ok(payload) => server.handle_message(client, &payload),
            Err(FrameError::ConnectionClosed) => break,
            Err(error) => {
                tracing::debug!(%client, %error, "read failed; closing");
                break;
            }
        }
    }

    server.disconnect(client);
    writer_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn default_config() -> FrameConfig {
        FrameConfig::default()
    }

    #[tokio::test]
    async fn test_single_frame_roundtrip() {
        let (mut client, mut server) = duplex(8192);
        let config = default_config();

        write_frame(&mut client, b"hello world", &config).await.unwrap();
        let received = read_frame(&mut server, &config).await.unwrap();
        assert_eq!(received, b"hello world");
    }

    #[tokio::test]
    async fn test_frames_do_not_merge() {
        let (mut client, mut server) = duplex(8192);
        let config = default_config();

        write_frame(&mut client, b"aaa", &config).await.unwrap();
        write_frame(&mut client, b"bbb", &config).await.unwrap();

        assert_eq!(read_frame(&mut server, &config).await.unwrap(), b"aaa");
        assert_eq!(read_frame(&mut server, &config).await.unwrap(), b"bbb");
    }

    #[tokio::test]
    async fn test_partial_reads_resume() {
        let (mut client, mut server) = duplex(8);
        let config = default_config();
        let payload = b"a payload larger than the duplex buffer";

        let write_config = config.clone();
        let writer = tokio::spawn(async move {
            write_frame(&mut client, payload, &write_config).await.unwrap();
        });

        let received = read_frame(&mut server, &config).await.unwrap();
        writer.await.unwrap();
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_on_read() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig {
            max_payload_size: 16,
        };

        client.write_all(&1024u32.to_le_bytes()).await.unwrap();
        client.flush().await.unwrap();

        let result = read_frame(&mut server, &config).await;
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_on_write() {
        let (mut client, _server) = duplex(8192);
        let config = FrameConfig {
            max_payload_size: 16,
        };
        let result = write_frame(&mut client, &[0u8; 64], &config).await;
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_zero_length_frame_is_valid() {
        let (mut client, mut server) = duplex(8192);
        let config = default_config();

        write_frame(&mut client, &[], &config).await.unwrap();
        let received = read_frame(&mut server, &config).await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_closed_connection_detected() {
        let (client, mut server) = duplex(8192);
        drop(client);

        let result = read_frame(&mut server, &default_config()).await;
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_length_prefix_is_little_endian() {
        let (mut client, mut server) = duplex(8192);
        client.write_all(&5u32.to_le_bytes()).await.unwrap();
        client.write_all(b"hello").await.unwrap();
        client.flush().await.unwrap();

        let received = read_frame(&mut server, &default_config()).await.unwrap();
        assert_eq!(received, b"hello");
    }
}
