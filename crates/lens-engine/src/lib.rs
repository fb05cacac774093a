//! Execution engine: operation dispatch and result streams.
//!
//! `execute` validates input, invokes the operation's resolver, drives the
//! value through the field resolver graph, and yields a lazy stream of
//! events: one `snapshot`, then `ops` carrying emit commands for live
//! changes, then `complete`. Mutations complete immediately after their
//! snapshot; queries and subscriptions stay open until cancelled.

mod context;
mod execute;
mod registry;
mod stream;

pub use context::OpContext;
pub use execute::ExecutionEngine;
pub use registry::{
    OperationDef, OperationFn, OperationRegistry, OperationRequest, OperationResolver,
    OperationStreamFn, OperationSubscribeFn, ValidateFn,
};
pub use stream::{OperationHandle, OperationStream, StreamEvent};

/// Error kinds surfaced on an operation stream. Every error terminates
/// the stream with one `error` event followed by `complete`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The operation path is not registered.
    #[error("unknown operation path {0:?}")]
    NotFound(String),

    /// Input failed the operation's validation hook.
    #[error("input validation failed: {0}")]
    Validation(String),

    /// The operation resolver (or the field graph under it) failed.
    #[error("resolver failed: {0}")]
    Resolver(String),
}

impl EngineError {
    /// Machine-readable code carried on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::Validation(_) => "validation",
            EngineError::Resolver(_) => "resolver",
        }
    }
}
