//! Shared types threaded through every hive process

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which role this process plays in the choreography.
///
/// Carried explicitly in the worker startup spec so shared shutdown logic
/// can branch: only the coordinator tears down the proxy and the tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessRole {
    /// The bootstrap process: owns the registry, proxy and tunnel
    Coordinator,
    /// A spawned worker process
    Worker,
}

impl ProcessRole {
    /// Whether this process is the coordinator
    pub fn is_coordinator(&self) -> bool {
        matches!(self, ProcessRole::Coordinator)
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessRole::Coordinator => write!(f, "coordinator"),
            ProcessRole::Worker => write!(f, "worker"),
        }
    }
}

/// Where to find the registry, captured at spawn time.
///
/// Handed to every worker inside its startup spec; the token is the
/// per-run random secret the registry server generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEndpoint {
    /// Host the registry listens on (always loopback in practice)
    pub host: String,
    /// Port the registry bound
    pub port: u16,
    /// Per-run authentication token (hex)
    pub token: String,
}

impl RegistryEndpoint {
    /// The `host:port` address string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
