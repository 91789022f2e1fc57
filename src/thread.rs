use std::thread::{self, ThreadId};

/// Asserts that calls happen on the thread that created the checker.
#[derive(Debug, Clone, Copy)]
pub struct ThreadChecker {
    owner: ThreadId,
}

impl ThreadChecker {
    /// Bind to the current thread.
    pub fn new() -> Self {
        ThreadChecker {
            owner: thread::current().id(),
        }
    }

    /// Whether we are on the owning thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Panic unless on the owning thread.
    #[track_caller]
    pub fn check(&self) {
        assert!(
            self.is_current(),
            "Called from {:?}, bound to {:?}",
            thread::current().id(),
            self.owner
        );
    }
}

impl Default for ThreadChecker {
    fn default() -> Self {
        Self::new()
    }
}
