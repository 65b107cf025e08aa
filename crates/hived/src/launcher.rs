//! Worker process launcher
//!
//! Workers are re-invocations of the current executable with a hidden
//! `worker` subcommand. The coordinator hands each one a typed startup
//! spec as a single JSON line on stdin: entry point identifier, named
//! bindings, runtime settings and the registry endpoint. Nothing about
//! the worker's behavior is synthesized as program text.

use std::collections::BTreeMap;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

use hive_core::config::{PollConfig, WebhookConfig};
use hive_core::{LaunchError, ProcessRole, RegistryEndpoint};
use hive_protocol::{AccessorInfo, Value};

/// One named input for a worker entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Binding {
    /// A plain value, passed through as-is
    Literal { value: Value },
    /// A handle to a shared object, resolved by accessor name at
    /// worker startup
    Shared { accessor: String },
}

/// Runtime settings a worker needs beyond its bindings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Polling cadence for remote primitive handles
    pub poll: PollConfig,
    /// Webhook registration behavior
    pub webhook: WebhookConfig,
}

/// Everything a worker needs to boot, serialized to one JSON line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupSpec {
    /// Identifier of the entry point the worker should run
    pub entry_point: String,
    /// Named inputs, literal or shared
    pub bindings: BTreeMap<String, Binding>,
    /// Runtime settings
    pub settings: WorkerSettings,
    /// Registry endpoint captured at spawn time; `None` only in
    /// single-instance mode, which never spawns workers
    pub registry: Option<RegistryEndpoint>,
    /// Role marker for shared shutdown logic
    pub role: ProcessRole,
}

impl StartupSpec {
    /// Serialize to the single-line handoff format
    pub fn to_line(&self) -> Result<String, LaunchError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the handoff line a worker reads from stdin
    pub fn from_line(line: &str) -> Result<Self, LaunchError> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Check every shared binding against the published accessor list.
    ///
    /// Run before spawning: a binding that names an unpublished
    /// accessor is a configuration error, not something to paper over
    /// with a default.
    pub fn validate(&self, accessors: &[AccessorInfo]) -> Result<(), LaunchError> {
        for (binding, value) in &self.bindings {
            if let Binding::Shared { accessor } = value {
                if !accessors.iter().any(|a| &a.name == accessor) {
                    return Err(LaunchError::UnboundAccessor {
                        binding: binding.clone(),
                        accessor: accessor.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The accessor name behind a shared binding
    pub fn shared_accessor(&self, binding: &str) -> Result<&str, LaunchError> {
        match self.bindings.get(binding) {
            Some(Binding::Shared { accessor }) => Ok(accessor),
            Some(Binding::Literal { .. }) => Err(LaunchError::BindingShape {
                binding: binding.to_string(),
                expected: "shared accessor".to_string(),
            }),
            None => Err(LaunchError::MissingBinding(binding.to_string())),
        }
    }

    /// The value behind a literal binding
    pub fn literal(&self, binding: &str) -> Result<&Value, LaunchError> {
        match self.bindings.get(binding) {
            Some(Binding::Literal { value }) => Ok(value),
            Some(Binding::Shared { .. }) => Err(LaunchError::BindingShape {
                binding: binding.to_string(),
                expected: "literal value".to_string(),
            }),
            None => Err(LaunchError::MissingBinding(binding.to_string())),
        }
    }
}

/// A launched worker process
pub struct WorkerProcess {
    child: Child,
    index: usize,
}

impl WorkerProcess {
    /// Spawn a worker and hand it `spec` over stdin.
    ///
    /// The worker is detached into its own session so a Ctrl-C at the
    /// coordinator's terminal does not reach it; the coordinator
    /// delivers SIGINT explicitly through [`terminate`].
    ///
    /// [`terminate`]: WorkerProcess::terminate
    pub async fn start(spec: &StartupSpec, index: usize) -> Result<Self, LaunchError> {
        let exe = std::env::current_exe().map_err(LaunchError::Spawn)?;
        let line = spec.to_line()?;

        let mut command = Command::new(exe);
        command
            .arg("worker")
            .stdin(Stdio::piped())
            .kill_on_drop(false);

        #[cfg(unix)]
        unsafe {
            command.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let mut child = command.spawn().map_err(LaunchError::Spawn)?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            LaunchError::Handoff(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "worker stdin was not captured",
            ))
        })?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(LaunchError::Handoff)?;
        stdin.write_all(b"\n").await.map_err(LaunchError::Handoff)?;
        stdin.shutdown().await.map_err(LaunchError::Handoff)?;
        drop(stdin);

        tracing::info!("spawned worker {} (pid {:?})", index, child.id());
        Ok(Self { child, index })
    }

    /// Which worker slot this process fills
    pub fn index(&self) -> usize {
        self.index
    }

    /// OS process id, while the process is still running
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Poll until the process exits
    pub async fn join(&mut self, interval: Duration) -> io::Result<std::process::ExitStatus> {
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Ask the worker to shut down cooperatively
    #[cfg(unix)]
    pub fn terminate(&mut self) {
        if let Some(pid) = self.child.id() {
            // ESRCH just means it already exited
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGINT);
            }
        }
    }

    /// Ask the worker to shut down
    #[cfg(not(unix))]
    pub fn terminate(&mut self) {
        let _ = self.child.start_kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_protocol::ObjectKind;

    fn spec_with_bindings(bindings: BTreeMap<String, Binding>) -> StartupSpec {
        StartupSpec {
            entry_point: "webhook_service".to_string(),
            bindings,
            settings: WorkerSettings::default(),
            registry: Some(RegistryEndpoint {
                host: "127.0.0.1".to_string(),
                port: 21000,
                token: "cafe".to_string(),
            }),
            role: ProcessRole::Worker,
        }
    }

    #[test]
    fn test_spec_line_roundtrip() {
        let mut bindings = BTreeMap::new();
        bindings.insert(
            "ports".to_string(),
            Binding::Shared {
                accessor: "get_ports".to_string(),
            },
        );
        bindings.insert(
            "greeting".to_string(),
            Binding::Literal {
                value: Value::Text("hello".to_string()),
            },
        );
        let spec = spec_with_bindings(bindings);

        let line = spec.to_line().unwrap();
        assert!(!line.contains('\n'));

        let parsed = StartupSpec::from_line(&line).unwrap();
        assert_eq!(parsed.entry_point, "webhook_service");
        assert_eq!(parsed.role, ProcessRole::Worker);
        assert_eq!(parsed.shared_accessor("ports").unwrap(), "get_ports");
        assert_eq!(
            parsed.literal("greeting").unwrap(),
            &Value::Text("hello".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_unbound_accessor() {
        let mut bindings = BTreeMap::new();
        bindings.insert(
            "lock".to_string(),
            Binding::Shared {
                accessor: "get_lock".to_string(),
            },
        );
        let spec = spec_with_bindings(bindings);

        let published = vec![AccessorInfo {
            name: "get_ports".to_string(),
            kind: ObjectKind::Queue,
        }];
        let result = spec.validate(&published);
        assert!(matches!(
            result,
            Err(LaunchError::UnboundAccessor { binding, accessor })
                if binding == "lock" && accessor == "get_lock"
        ));
    }

    #[test]
    fn test_validate_accepts_published_accessors() {
        let mut bindings = BTreeMap::new();
        bindings.insert(
            "lock".to_string(),
            Binding::Shared {
                accessor: "get_lock".to_string(),
            },
        );
        bindings.insert(
            "limit".to_string(),
            Binding::Literal {
                value: Value::Int(10),
            },
        );
        let spec = spec_with_bindings(bindings);

        let published = vec![AccessorInfo {
            name: "get_lock".to_string(),
            kind: ObjectKind::Lock,
        }];
        assert!(spec.validate(&published).is_ok());
    }

    #[test]
    fn test_binding_shape_errors() {
        let mut bindings = BTreeMap::new();
        bindings.insert(
            "limit".to_string(),
            Binding::Literal {
                value: Value::Int(10),
            },
        );
        let spec = spec_with_bindings(bindings);

        assert!(matches!(
            spec.shared_accessor("limit"),
            Err(LaunchError::BindingShape { .. })
        ));
        assert!(matches!(
            spec.literal("nope"),
            Err(LaunchError::MissingBinding(_))
        ));
    }

    #[test]
    fn test_from_line_rejects_garbage() {
        assert!(matches!(
            StartupSpec::from_line("not json"),
            Err(LaunchError::InvalidSpec(_))
        ));
    }
}
