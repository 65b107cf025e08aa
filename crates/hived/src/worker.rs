//! Worker bootstrap
//!
//! Entry path for a process spawned with the hidden `worker`
//! subcommand: read the startup spec from stdin, connect to the
//! registry, run the claim protocol, serve, activate on the broadcast
//! URL, and shut down on SIGINT.

use std::net::TcpListener;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use hive_core::net::next_available_port;
use hive_core::{HiveError, LaunchError, RegistryError};
use hive_protocol::Value;
use hive_registry::{RemoteEvent, RemoteLock, RemoteQueue};

use crate::launcher::StartupSpec;
use crate::service;
use crate::webhook::{self, HttpWebhook, WebhookRegistrar};

/// Entry point identifier for the webhook-serving worker
pub const WEBHOOK_SERVICE: &str = "webhook_service";

/// Read the startup spec from stdin and run the named entry point
pub async fn run() -> Result<(), HiveError> {
    let spec = read_spec().await?;
    tracing::info!(
        "worker pid {} booting (entry point {:?})",
        std::process::id(),
        spec.entry_point
    );

    match spec.entry_point.as_str() {
        WEBHOOK_SERVICE => webhook_service(spec).await,
        other => Err(LaunchError::UnknownEntryPoint(other.to_string()).into()),
    }
}

async fn read_spec() -> Result<StartupSpec, HiveError> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(StartupSpec::from_line(&line)?)
}

/// The fleet worker: claim a port under the shared lock, serve the
/// webhook receiver on it, and register the broadcast public URL.
async fn webhook_service(spec: StartupSpec) -> Result<(), HiveError> {
    // No endpoint means the coordinator spawned us wrong; there is
    // nothing sensible to fall back to.
    let endpoint = spec
        .registry
        .clone()
        .ok_or_else(|| LaunchError::MissingBinding("registry endpoint".to_string()))?;
    let poll = &spec.settings.poll;

    let mut lock = RemoteLock::open(&endpoint, spec.shared_accessor("lock")?, poll).await?;
    let mut ports = RemoteQueue::open(&endpoint, spec.shared_accessor("ports")?, poll).await?;
    let mut published =
        RemoteEvent::open(&endpoint, spec.shared_accessor("published")?, poll).await?;

    lock.acquire().await?;
    let (port, listener) = match claim_port(&mut ports).await {
        Ok(claimed) => {
            lock.release().await?;
            claimed
        }
        Err(e) => {
            // Release before propagating or the whole fleet deadlocks
            let _ = lock.release().await;
            return Err(e);
        }
    };
    tracing::info!("claimed port {}", port);

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(service::serve(listener, shutdown.clone()));

    published.wait().await?;
    let url = ports
        .get()
        .await?
        .and_then(|v| v.as_text().map(String::from))
        .ok_or_else(|| RegistryError::Remote("no public URL was broadcast".to_string()))?;
    tracing::info!("activated with public url {}", url);

    let registrar = spec
        .settings
        .webhook
        .register_url
        .clone()
        .map(HttpWebhook::new);
    if let Some(registrar) = &registrar {
        if let Err(e) = webhook::register_with_retry(registrar, &url, &spec.settings.webhook).await
        {
            tracing::error!("webhook registration failed, aborting worker: {}", e);
            shutdown.cancel();
            let _ = server.await;
            return Err(e.into());
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("worker pid {} shutting down", std::process::id());

    if let Some(registrar) = &registrar {
        if let Err(e) = registrar.remove().await {
            tracing::warn!("failed to remove webhook: {}", e);
        }
    }
    shutdown.cancel();
    match server.await {
        Ok(result) => result?,
        Err(e) => tracing::warn!("service task failed: {}", e),
    }

    Ok(())
}

/// Pop a candidate from the shared queue, probe forward to a free
/// port, and bind it.
///
/// Must run while the shared lock is held: the bind is what makes the
/// next claimant's probe skip this port, and the written-back value is
/// the barrier contribution the coordinator counts.
pub async fn claim_port(ports: &mut RemoteQueue) -> Result<(u16, TcpListener), HiveError> {
    let candidate = ports
        .get()
        .await?
        .and_then(|v| v.as_int())
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| RegistryError::Remote("port queue held no usable candidate".to_string()))?;

    let port = next_available_port(candidate)?;
    let listener = TcpListener::bind(("127.0.0.1", port))?;
    ports.put(Value::Int(i64::from(port)), 1).await?;

    Ok((port, listener))
}
