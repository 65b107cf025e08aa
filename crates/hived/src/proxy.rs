//! Reverse-proxy (nginx) manager
//!
//! Renders a complete nginx config over the claimed worker ports,
//! overwrites the artifact at its fixed path, and drives the nginx
//! binary with `-c` for start and `-s quit` for graceful stop. The
//! config is regenerated wholesale on every run; the file on disk is an
//! artifact, never an input.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use hive_core::config::ProxyConfig;
use hive_core::net::next_available_port;
use hive_core::ProxyError;

/// Maximum simultaneous connections per nginx worker
const WORKER_CONNECTIONS: u32 = 10_000;

/// Name of the upstream group fronting the workers
const UPSTREAM: &str = "hive_workers";

/// Render the full nginx config for `ports` behind `listen_port`
pub fn render_config(ports: &[u16], listen_port: u16) -> String {
    let mut out = String::new();
    out.push_str("events {\n");
    out.push_str(&format!(
        "    worker_connections {};\n",
        WORKER_CONNECTIONS
    ));
    out.push_str("}\n\nhttp {\n");
    out.push_str(&format!("    upstream {} {{\n", UPSTREAM));
    for port in ports {
        out.push_str(&format!("        server 127.0.0.1:{};\n", port));
    }
    out.push_str("    }\n\n    server {\n");
    out.push_str(&format!("        listen {};\n\n", listen_port));
    out.push_str("        location / {\n");
    out.push_str(&format!("            proxy_pass http://{};\n", UPSTREAM));
    out.push_str("        }\n    }\n}\n");
    out
}

/// Owns the config artifact and the nginx process lifecycle
pub struct ProxyManager {
    config: ProxyConfig,
    listen_port: Option<u16>,
}

impl ProxyManager {
    /// Create a manager; nothing touches the filesystem until
    /// [`generate_config`](ProxyManager::generate_config)
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            listen_port: None,
        }
    }

    /// The externally reachable port, once allocated
    pub fn listen_port(&self) -> Option<u16> {
        self.listen_port
    }

    /// Allocate the listen port and overwrite the config artifact
    /// with a config proxying to `ports`
    pub fn generate_config(&mut self, ports: &[u16]) -> Result<u16, ProxyError> {
        let listen_port =
            next_available_port(self.config.listen_port_base).map_err(|source| {
                ProxyError::ConfigWrite {
                    path: self.config.config_path.clone(),
                    source,
                }
            })?;

        let rendered = render_config(ports, listen_port);
        std::fs::write(&self.config.config_path, rendered).map_err(|source| {
            ProxyError::ConfigWrite {
                path: self.config.config_path.clone(),
                source,
            }
        })?;

        tracing::info!(
            "wrote proxy config for {} workers to {:?} (listen port {})",
            ports.len(),
            self.config.config_path,
            listen_port
        );
        self.listen_port = Some(listen_port);
        Ok(listen_port)
    }

    /// Launch nginx against the generated config.
    ///
    /// nginx daemonizes itself; the awaited status is the foreground
    /// parent's, so a non-zero exit here means the config was rejected
    /// or the listen port could not be bound. A short grace sleep gives
    /// the daemonized master time to bind before callers proceed.
    pub async fn start(&self) -> Result<(), ProxyError> {
        if self.listen_port.is_none() {
            return Err(ProxyError::NotConfigured);
        }
        let config_path = self.absolute_config_path()?;

        let status = Command::new(&self.config.binary)
            .arg("-c")
            .arg(&config_path)
            .status()
            .await
            .map_err(ProxyError::Spawn)?;

        if !status.success() {
            return Err(ProxyError::StartFailed {
                status: status.code().unwrap_or(-1),
            });
        }

        tokio::time::sleep(Duration::from_secs(self.config.startup_grace_secs)).await;
        tracing::info!("proxy started on port {:?}", self.listen_port);
        Ok(())
    }

    /// Ask the running nginx master to finish in-flight requests and
    /// exit
    pub async fn stop(&self) -> Result<(), ProxyError> {
        let config_path = self.absolute_config_path()?;

        let status = Command::new(&self.config.binary)
            .arg("-c")
            .arg(&config_path)
            .arg("-s")
            .arg("quit")
            .status()
            .await
            .map_err(ProxyError::Spawn)?;

        if !status.success() {
            return Err(ProxyError::StopFailed {
                status: status.code().unwrap_or(-1),
            });
        }

        tracing::info!("proxy stopped");
        Ok(())
    }

    /// nginx resolves a relative `-c` against its compile-time prefix,
    /// so the path must be absolute
    fn absolute_config_path(&self) -> Result<PathBuf, ProxyError> {
        let path: &Path = &self.config.config_path;
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        std::fs::canonicalize(path).map_err(|source| ProxyError::ConfigWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}
