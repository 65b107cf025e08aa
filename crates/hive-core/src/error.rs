//! Core error types for hive

use hive_protocol::ProtocolError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the hive ecosystem
#[derive(Error, Debug)]
pub enum HiveError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Worker launch error
    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    /// Reverse-proxy error
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// Webhook registration error
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Public-tunnel error
    #[error("Tunnel error: {0}")]
    Tunnel(#[from] TunnelError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registry and shared-object errors
#[derive(Error, Debug)]
pub enum RegistryError {
    /// An object with this name already exists
    #[error("Object already registered: {0}")]
    DuplicateObject(String),

    /// No object with this name exists
    #[error("Unknown object: {0}")]
    UnknownObject(String),

    /// An accessor with this name is already published
    #[error("Accessor already registered: {0}")]
    DuplicateAccessor(String),

    /// No accessor published under this name
    #[error("Unknown accessor: {0}")]
    UnknownAccessor(String),

    /// Operation not valid for the object's kind
    #[error("Operation {op} not valid for {kind} object {accessor:?}")]
    WrongKind {
        accessor: String,
        kind: hive_protocol::ObjectKind,
        op: String,
    },

    /// Handshake rejected by the registry
    #[error("Registry authentication failed")]
    AuthenticationFailed,

    /// Could not reach the registry at its captured address
    #[error("Registry unreachable at {0}")]
    Unreachable(String),

    /// The registry answered with an error frame
    #[error("Registry rejected the request: {0}")]
    Remote(String),

    /// The server closed the connection mid-request
    #[error("Registry connection closed unexpectedly")]
    ConnectionClosed,

    /// A poll-based wait ran past its configured deadline
    #[error("Deadline of {deadline:?} exceeded while waiting on {what}")]
    DeadlineExceeded { what: String, deadline: Duration },

    /// Protocol-level failure on the registry connection
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Worker launch errors
#[derive(Error, Debug)]
pub enum LaunchError {
    /// A shared binding names an accessor the registry does not publish
    #[error("Binding {binding:?} references unpublished accessor {accessor:?}")]
    UnboundAccessor { binding: String, accessor: String },

    /// The startup spec could not be serialized or parsed
    #[error("Invalid startup spec: {0}")]
    InvalidSpec(#[from] serde_json::Error),

    /// No entry point registered under this identifier
    #[error("Unknown entry point: {0}")]
    UnknownEntryPoint(String),

    /// A required binding is missing from the startup spec
    #[error("Missing binding: {0}")]
    MissingBinding(String),

    /// A binding has the wrong shape for its consumer
    #[error("Binding {binding:?} has unexpected shape: {expected}")]
    BindingShape { binding: String, expected: String },

    /// Spawning the worker process failed
    #[error("Failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// Writing the startup spec to the worker's stdin failed
    #[error("Failed to hand off startup spec: {0}")]
    Handoff(#[source] std::io::Error),
}

/// Reverse-proxy errors
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Writing the config artifact failed
    #[error("Failed to write proxy config to {path:?}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The proxy binary could not be spawned
    #[error("Failed to spawn proxy process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The proxy process exited with a failure before daemonizing
    #[error("Proxy failed to start (exit status {status})")]
    StartFailed { status: i32 },

    /// The stop control command was rejected
    #[error("Proxy failed to stop (exit status {status})")]
    StopFailed { status: i32 },

    /// No config has been generated yet
    #[error("Proxy config has not been generated")]
    NotConfigured,
}

/// Public-tunnel errors
#[derive(Error, Debug)]
pub enum TunnelError {
    /// The tunnel agent answered with a failure status
    #[error("Tunnel agent rejected the request with status {0}")]
    Agent(u16),

    /// The agent's reply carried no public URL
    #[error("Tunnel agent reply carried no public URL")]
    MissingUrl,

    /// Transport-level failure talking to the agent
    #[error("Tunnel transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Webhook registration errors
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Transient rejection (rate limit or bad request) - retryable
    #[error("Webhook registration rejected with status {0} (transient)")]
    Transient(u16),

    /// Terminal rejection from the external service
    #[error("Webhook registration rejected with status {0}")]
    Rejected(u16),

    /// The retry budget ran out
    #[error("Webhook registration failed after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },

    /// Transport-level failure
    #[error("Webhook transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
