//! hive-core: Core abstractions and configuration for hive
//!
//! Shared foundation for the registry, the launcher and the daemon:
//! error taxonomy, TOML configuration, auth tokens, the sequential port
//! allocator and the process role marker.

pub mod auth;
pub mod config;
pub mod error;
pub mod net;
pub mod types;

pub use error::{
    ConfigError, HiveError, LaunchError, ProxyError, RegistryError, TunnelError, WebhookError,
};
pub use types::{ProcessRole, RegistryEndpoint};
