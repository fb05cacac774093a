//! Operation result streams and their cancellation handles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lens_command::EmitCommand;
use lens_resolve::CleanupBag;
use lens_value::Value;
use tokio::sync::mpsc;

/// One event on an operation's result stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A full result value.
    Snapshot {
        /// The (selection-projected) result.
        data: Value,
    },
    /// Incremental changes; the client applies them to its local copy of
    /// the previous snapshot.
    Ops {
        /// Commands in application order.
        commands: Vec<EmitCommand>,
    },
    /// Terminal failure. Always followed by [`StreamEvent::Complete`].
    Error {
        /// Human-readable description.
        message: String,
        /// Machine-readable code.
        code: String,
    },
    /// The stream is finished; no further events follow.
    Complete,
}

/// Consumer side of one operation's event stream.
pub struct OperationStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    handle: OperationHandle,
}

impl OperationStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<StreamEvent>, handle: OperationHandle) -> Self {
        Self { rx, handle }
    }

    /// Waits for the next event. `None` means every sender is gone.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Non-blocking poll, for tests and opportunistic drains.
    pub fn try_next(&mut self) -> Option<StreamEvent> {
        self.rx.try_recv().ok()
    }

    /// The cancellation handle for this operation.
    pub fn handle(&self) -> OperationHandle {
        self.handle.clone()
    }
}

/// Shared control surface for one running operation. Cloneable; all
/// clones refer to the same operation.
#[derive(Clone)]
pub struct OperationHandle {
    cancelled: Arc<AtomicBool>,
    cleanups: CleanupBag,
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl OperationHandle {
    pub(crate) fn new(cleanups: CleanupBag, tx: mpsc::UnboundedSender<StreamEvent>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            cleanups,
            tx,
        }
    }

    /// Cancels the operation: stops further emission, runs cleanup hooks
    /// in reverse registration order, and terminates the stream.
    /// Idempotent.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cleanups.run();
        let _ = self.tx.send(StreamEvent::Complete);
    }

    /// Whether [`OperationHandle::cancel`] has run.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn cleanups(&self) -> &CleanupBag {
        &self.cleanups
    }

    pub(crate) fn send_snapshot(&self, data: Value) {
        if !self.is_cancelled() {
            let _ = self.tx.send(StreamEvent::Snapshot { data });
        }
    }

    pub(crate) fn send_ops(&self, commands: Vec<EmitCommand>) {
        if !self.is_cancelled() {
            let _ = self.tx.send(StreamEvent::Ops { commands });
        }
    }

    /// Emits one error event then completes the stream.
    pub(crate) fn fail(&self, message: String, code: &str) {
        if self.is_cancelled() {
            return;
        }
        let _ = self.tx.send(StreamEvent::Error {
            message,
            code: code.to_string(),
        });
        self.complete();
    }

    /// Completes the stream normally and runs cleanup hooks.
    pub(crate) fn complete(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cleanups.run();
        let _ = self.tx.send(StreamEvent::Complete);
    }
}
