//! Configuration management for hive

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hive")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// Top-level configuration for the hive daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HiveConfig {
    /// Coordinator / worker-fleet settings
    pub coordinator: CoordinatorConfig,
    /// Shared-object registry settings
    pub registry: RegistryConfig,
    /// Polling behavior of the synchronization primitives
    pub poll: PollConfig,
    /// Reverse-proxy settings
    pub proxy: ProxyConfig,
    /// Public-tunnel settings
    pub tunnel: TunnelConfig,
    /// Webhook registration settings
    pub webhook: WebhookConfig,
}

/// Coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Number of worker processes to launch.
    /// With 1 the service runs in-process, without registry or proxy.
    pub instances: usize,

    /// First candidate port for worker listeners
    pub worker_port_base: u16,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            instances: 1,
            worker_port_base: 3001,
        }
    }
}

/// Registry transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Host to bind (loopback only is enforced server-side)
    pub host: String,

    /// First candidate port for the registry listener
    pub port_base: u16,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port_base: 21000,
        }
    }
}

/// Polling behavior of remote primitive handles.
///
/// All primitive waits (lock acquire, event wait, barrier wait) poll at
/// `interval`; `deadline` opts into timeout-based failure instead of
/// indefinite blocking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Poll interval in milliseconds
    pub interval_ms: u64,

    /// Optional wait deadline in seconds; absent means wait forever
    pub deadline_secs: Option<u64>,
}

impl PollConfig {
    /// Poll interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Optional deadline as a Duration
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            deadline_secs: None,
        }
    }
}

/// Reverse-proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// First candidate port for the proxy's externally reachable listener
    pub listen_port_base: u16,

    /// Where the generated config artifact is written
    pub config_path: PathBuf,

    /// Proxy binary to invoke
    pub binary: String,

    /// How long to wait for the proxy master to bind after daemonizing
    pub startup_grace_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_port_base: 8000,
            config_path: PathBuf::from("nginx.conf"),
            binary: "nginx".to_string(),
            startup_grace_secs: 2,
        }
    }
}

/// Public-tunnel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Base URL of the tunnel provider's local agent API
    pub agent_api: String,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            agent_api: "http://127.0.0.1:4040".to_string(),
        }
    }
}

/// Webhook registration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Endpoint the public URL is registered with; absent disables
    /// registration (workers just serve)
    pub register_url: Option<String>,

    /// Retry budget for transient registration failures
    pub max_attempts: u32,

    /// Fixed backoff between attempts, in seconds
    pub backoff_secs: u64,
}

impl WebhookConfig {
    /// Backoff as a Duration
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            register_url: None,
            max_attempts: 5,
            backoff_secs: 2,
        }
    }
}
