//! Graph state manager: canonical per-entity state, per-client shadow
//! state, subscriber fan-out, version accounting, and reconnect
//! resolution.
//!
//! The manager owns the single source of truth for every emitted entity.
//! Each state-changing emit bumps the entity's version, appends a patch to
//! the operation log, and sends every subscriber exactly the fields it is
//! subscribed to, diffed against what that client already holds.

mod fieldset;
mod manager;
mod reconnect;
mod shadow;

pub use fieldset::FieldSet;
pub use manager::{
    ClientId, GraphStateManager, RetentionPolicy, SendError, SendFn, StatePolicy, StateStats,
    UnsubscribedHook,
};

use lens_command::CommandError;

/// Errors surfaced by graph state operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// An operation referenced a client id that was never added.
    #[error("unknown client {0}")]
    UnknownClient(ClientId),

    /// `emit` was handed non-object data for an object entity.
    #[error("emit data for {entity}:{id} is not an object")]
    NotAnObject {
        /// Entity type name.
        entity: String,
        /// Entity instance id.
        id: String,
    },

    /// A command could not be applied to canonical state.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// An update could not be applied to canonical state.
    #[error(transparent)]
    Codec(#[from] lens_codec::CodecError),
}
