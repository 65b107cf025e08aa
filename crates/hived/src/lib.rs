//! hived: the hive daemon
//!
//! One binary, two roles. Run plain, it is the coordinator: it builds
//! the shared-object registry, launches the worker fleet, fronts the
//! claimed worker ports with a reverse proxy, opens a public tunnel and
//! broadcasts the public URL. Run with the hidden `worker` subcommand
//! (only ever done by the coordinator itself), it reads a startup spec
//! from stdin and becomes one worker of that fleet.

pub mod coordinator;
pub mod launcher;
pub mod proxy;
pub mod service;
pub mod tunnel;
pub mod webhook;
pub mod worker;

pub use launcher::{Binding, StartupSpec, WorkerProcess, WorkerSettings};
pub use proxy::ProxyManager;
pub use tunnel::{Tunnel, TunnelClient};
pub use webhook::{HttpWebhook, WebhookRegistrar};
