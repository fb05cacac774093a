//! The seam between resolver code and whoever owns canonical state.

use crate::{CommandError, EmitCommand};

/// Receives emit commands addressed to an entity instance.
///
/// The graph state manager implements this on the server; tests implement
/// it with an in-memory recorder. Resolver-facing contexts hold it as a
/// trait object so resolver code never sees the manager type.
pub trait CommandSink: Send + Sync {
    /// Applies `command` to the entity `entity`/`id`.
    fn process(&self, entity: &str, id: &str, command: EmitCommand) -> Result<(), CommandError>;
}
