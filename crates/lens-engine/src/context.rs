//! Per-operation context handed to resolver code.

use std::sync::Arc;

use lens_command::{CommandError, CommandSink, EmitCommand};
use lens_resolve::CleanupBag;

/// Everything a resolver may touch during one operation: the command sink
/// feeding the graph state manager, and the cleanup list for teardown
/// hooks. Replaces per-operation closure capture with an explicit struct.
#[derive(Clone)]
pub struct OpContext {
    sink: Arc<dyn CommandSink>,
    cleanups: CleanupBag,
}

impl OpContext {
    pub(crate) fn new(sink: Arc<dyn CommandSink>, cleanups: CleanupBag) -> Self {
        Self { sink, cleanups }
    }

    /// Emits a command against an entity; it funnels into canonical state
    /// and fans out to that entity's subscribers.
    pub fn emit(&self, entity: &str, id: &str, command: EmitCommand) -> Result<(), CommandError> {
        self.sink.process(entity, id, command)
    }

    /// Registers a hook to run (in reverse registration order) when this
    /// operation is cancelled or completes.
    pub fn on_cleanup(&self, hook: impl FnOnce() + Send + 'static) {
        self.cleanups.register(hook);
    }
}
