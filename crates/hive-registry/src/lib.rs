//! hive-registry: Shared-object registry and synchronization primitives
//!
//! The registry is a process-boundary object server: the coordinator
//! creates named instances of the primitives (Lock, Event, CounterQueue)
//! inside its own process, publishes accessors for them, and serves them
//! over loopback TCP. Worker processes hold remote handles that
//! manipulate the shared state through polled RPC.
//!
//! All waits poll; there is no blocking system call on the server. A
//! peer that crashes while holding the lock leaves it held forever;
//! callers can opt into a deadline through
//! [`hive_core::config::PollConfig`] instead of waiting indefinitely.

pub mod client;
pub mod primitives;
pub mod registry;
pub mod server;

pub use client::{RegistryClient, RemoteEvent, RemoteLock, RemoteQueue};
pub use primitives::{CounterQueue, FlagEvent, PollLock};
pub use registry::{Registry, SharedObject};
pub use server::{RegistryHandle, RegistryServer};
