//! Client-side mirror of server state.
//!
//! The mirror applies exactly the same machinery the server uses: field
//! updates through `lens-codec`, emit commands through the shared
//! `lens-command` applier, and reconnect results (patches or snapshots)
//! through `lens-codec`'s patch application. If server and client ever
//! disagree about a state transition, the bug is here or nowhere.

mod backoff;
mod mirror;
mod reconnect;

pub use backoff::{BackoffConfig, ReconnectBackoff};
pub use mirror::{MirrorStore, OperationMirror};

/// Errors from applying server messages to the local mirror.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A field update failed to apply.
    #[error(transparent)]
    Codec(#[from] lens_codec::CodecError),

    /// An ops command failed to apply.
    #[error(transparent)]
    Command(#[from] lens_command::CommandError),

    /// A snapshot failed to decompress or decode.
    #[error(transparent)]
    Wire(#[from] lens_wire::WireError),
}
