//! Live-field publisher plumbing.

use std::sync::{Arc, Mutex};

use lens_command::EmitCommand;

/// Handed to a live-field publisher; each call surfaces one emit command
/// on the owning operation's stream, prefixed with the field's path.
pub type LiveEmit = Arc<dyn Fn(EmitCommand) + Send + Sync>;

/// Cleanup hooks registered by publishers, run in reverse registration
/// order when the operation is cancelled or completes.
#[derive(Clone, Default)]
pub struct CleanupBag {
    hooks: Arc<Mutex<Vec<Box<dyn FnOnce() + Send>>>>,
}

impl CleanupBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook.
    pub fn register(&self, hook: impl FnOnce() + Send + 'static) {
        if let Ok(mut hooks) = self.hooks.lock() {
            hooks.push(Box::new(hook));
        }
    }

    /// Runs all hooks in reverse registration order. A panicking hook is
    /// logged and does not block the rest. Idempotent: hooks run once.
    pub fn run(&self) {
        let drained: Vec<_> = match self.hooks.lock() {
            Ok(mut hooks) => hooks.drain(..).collect(),
            Err(_) => return,
        };
        for hook in drained.into_iter().rev() {
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(hook)).is_err() {
                tracing::warn!("cleanup hook panicked; continuing with remaining hooks");
            }
        }
    }

    /// Number of pending hooks.
    pub fn len(&self) -> usize {
        self.hooks.lock().map(|hooks| hooks.len()).unwrap_or(0)
    }

    /// Whether no hooks are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hooks_run_in_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let bag = CleanupBag::new();
        for n in 0..3 {
            let order = order.clone();
            bag.register(move || order.lock().unwrap().push(n));
        }
        bag.run();
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn test_run_is_idempotent() {
        let count = Arc::new(Mutex::new(0));
        let bag = CleanupBag::new();
        let seen = count.clone();
        bag.register(move || *seen.lock().unwrap() += 1);
        bag.run();
        bag.run();
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_panicking_hook_does_not_block_others() {
        let ran = Arc::new(Mutex::new(false));
        let bag = CleanupBag::new();
        let seen = ran.clone();
        bag.register(move || *seen.lock().unwrap() = true);
        bag.register(|| panic!("hook exploded"));
        bag.run();
        assert!(*ran.lock().unwrap(), "later-registered panic must not stop earlier hooks");
    }
}
