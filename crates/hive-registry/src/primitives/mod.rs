//! Cross-process synchronization primitives
//!
//! These hold the authoritative state inside the registry process.
//! Remote parties reach them through `ObjectOp` invocations; the
//! operations here are each atomic, so the polling remote handles never
//! observe a half-applied transition.

mod event;
mod lock;
mod queue;

pub use event::FlagEvent;
pub use lock::PollLock;
pub use queue::CounterQueue;
