//! Manual-reset event flag

use std::sync::atomic::{AtomicBool, Ordering};

/// Binary event flag. Manual reset only - `set` stays visible to every
/// waiter until someone calls `clear`.
#[derive(Debug, Default)]
pub struct FlagEvent {
    flag: AtomicBool,
}

impl FlagEvent {
    /// Create a new, unset event
    pub fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Set the flag
    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Clear the flag
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Whether the flag is set
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
