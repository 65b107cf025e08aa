//! Poll-acquired mutual-exclusion lock

use std::sync::atomic::{AtomicBool, Ordering};

/// Binary lock acquired by polling.
///
/// `try_acquire` is a single compare-and-swap, so of any number of
/// simultaneous acquirers exactly one wins and the rest keep polling.
/// There is no owner tracking: a holder that crashes without releasing
/// leaves the lock held forever.
#[derive(Debug, Default)]
pub struct PollLock {
    held: AtomicBool,
}

impl PollLock {
    /// Create a new, unheld lock
    pub fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Attempt to take the lock; returns whether this caller won it
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Release the lock unconditionally
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    /// Whether the lock is currently held
    pub fn locked(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}
