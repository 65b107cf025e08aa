//! Coordinator choreography
//!
//! The launch sequence for a multi-worker run: build the registry,
//! seed the port queue, spawn the fleet, gather the claimed ports at
//! the barrier, front them with the reverse proxy, open the public
//! tunnel, broadcast the URL, then sit with the workers until shutdown.
//!
//! With `instances <= 1` none of that machinery is needed and the
//! service runs directly in this process.

use std::collections::BTreeMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use hive_core::config::HiveConfig;
use hive_core::net::next_available_port;
use hive_core::ProcessRole;
use hive_protocol::{ObjectKind, Value};
use hive_registry::{Registry, RegistryServer};

use crate::launcher::{Binding, StartupSpec, WorkerProcess, WorkerSettings};
use crate::proxy::ProxyManager;
use crate::service;
use crate::tunnel::TunnelClient;
use crate::worker;

/// Run the coordinator until shutdown
pub async fn run(config: HiveConfig) -> Result<()> {
    if config.coordinator.instances <= 1 {
        return run_single(&config).await;
    }
    run_fleet(&config).await
}

/// Single-instance mode: serve in-process, no registry, proxy or tunnel
async fn run_single(config: &HiveConfig) -> Result<()> {
    let port = next_available_port(config.coordinator.worker_port_base)
        .context("no free port for the service")?;
    let listener =
        TcpListener::bind(("127.0.0.1", port)).context("failed to bind the service port")?;
    tracing::info!("single-instance mode, serving on port {}", port);

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(service::serve(listener, shutdown.clone()));

    shutdown_signal().await;
    shutdown.cancel();
    server.await?.context("service failed")?;
    Ok(())
}

async fn run_fleet(config: &HiveConfig) -> Result<()> {
    let instances = config.coordinator.instances;
    tracing::info!("launching a fleet of {} workers", instances);

    // Init: shared objects and their accessors, in dependency order
    let registry = Arc::new(Registry::new());
    registry.create_object("ports", ObjectKind::Queue)?;
    registry.create_object("claim", ObjectKind::Lock)?;
    registry.create_object("published", ObjectKind::Event)?;
    registry.register_accessor("get_ports", "ports")?;
    registry.register_accessor("get_lock", "claim")?;
    registry.register_accessor("get_published", "published")?;

    let ports = registry.queue("ports")?;
    ports.attach_counter();

    let handle = RegistryServer::new(Arc::clone(&registry), &config.registry)
        .serve()
        .await
        .context("failed to start the registry server")?;

    // Seed the first candidate, then clear the mirror so the barrier
    // counts only worker contributions
    ports.put(Value::Int(i64::from(config.coordinator.worker_port_base)), 1);
    ports.reset_counter();

    // Spawn
    let spec = worker_spec(config, &handle.endpoint);
    spec.validate(&registry.list_accessors())?;
    let mut workers = Vec::with_capacity(instances);
    let mut outcome = Ok(());
    for index in 0..instances {
        match WorkerProcess::start(&spec, index).await {
            Ok(worker) => workers.push(worker),
            Err(e) => {
                outcome = Err(e).context("spawning the worker fleet");
                break;
            }
        }
    }

    let interval = config.poll.interval();
    if outcome.is_ok() {
        outcome = supervise(config, &registry, instances, interval).await;
    }

    // Shutdown or failure: bring the fleet down either way
    for worker in &mut workers {
        worker.terminate();
    }
    for worker in &mut workers {
        match worker.join(interval).await {
            Ok(status) => tracing::info!("worker {} exited with {}", worker.index(), status),
            Err(e) => tracing::warn!("failed to join worker {}: {}", worker.index(), e),
        }
    }

    handle.shutdown();
    outcome
}

/// Everything between spawn and shutdown: gather, publish, broadcast,
/// steady state, teardown of the proxy and tunnel
async fn supervise(
    config: &HiveConfig,
    registry: &Registry,
    instances: usize,
    interval: Duration,
) -> Result<()> {
    let ports = registry.queue("ports")?;

    // Gather: every live worker has bound a port and contributed it
    let claimed = ports
        .wait_for_count(instances, interval, config.poll.deadline())
        .await
        .context("waiting for workers to claim their ports")?;
    ports.detach_counter();

    let claimed_ports: Vec<u16> = claimed
        .iter()
        .filter_map(|v| v.as_int())
        .filter_map(|n| u16::try_from(n).ok())
        .collect();
    anyhow::ensure!(
        claimed_ports.len() == instances,
        "barrier yielded {} usable ports for {} workers",
        claimed_ports.len(),
        instances
    );
    tracing::info!("fleet bound ports {:?}", claimed_ports);

    // Publish topology
    let mut proxy = ProxyManager::new(config.proxy.clone());
    let listen_port = proxy.generate_config(&claimed_ports)?;
    proxy.start().await.context("starting the reverse proxy")?;

    let tunnel_client = TunnelClient::new(&config.tunnel);
    let tunnel = match tunnel_client.open(listen_port).await {
        Ok(tunnel) => tunnel,
        Err(e) => {
            let _ = proxy.stop().await;
            return Err(e).context("opening the public tunnel");
        }
    };
    tracing::info!("fleet public url: {}", tunnel.public_url);

    // Broadcast: clear the claim leftover first, then one URL copy per
    // worker, then the activation event
    let _ = ports.get_last();
    ports.put(Value::Text(tunnel.public_url.clone()), instances as u32);
    registry.event("published")?.set();

    // Steady state
    shutdown_signal().await;
    tracing::info!("shutting down the fleet");

    if let Err(e) = tunnel_client.close(&tunnel).await {
        tracing::warn!("failed to close the tunnel: {}", e);
    }
    if let Err(e) = proxy.stop().await {
        tracing::warn!("failed to stop the proxy: {}", e);
    }
    Ok(())
}

/// The startup spec shared by every worker in the fleet
fn worker_spec(config: &HiveConfig, endpoint: &hive_core::RegistryEndpoint) -> StartupSpec {
    let mut bindings = BTreeMap::new();
    bindings.insert(
        "lock".to_string(),
        Binding::Shared {
            accessor: "get_lock".to_string(),
        },
    );
    bindings.insert(
        "ports".to_string(),
        Binding::Shared {
            accessor: "get_ports".to_string(),
        },
    );
    bindings.insert(
        "published".to_string(),
        Binding::Shared {
            accessor: "get_published".to_string(),
        },
    );

    StartupSpec {
        entry_point: worker::WEBHOOK_SERVICE.to_string(),
        bindings,
        settings: WorkerSettings {
            poll: config.poll.clone(),
            webhook: config.webhook.clone(),
        },
        registry: Some(endpoint.clone()),
        role: ProcessRole::Worker,
    }
}

/// Resolve on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
    }
}
