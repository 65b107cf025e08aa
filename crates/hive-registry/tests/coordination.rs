//! Integration tests exercising the registry over real loopback TCP

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use hive_core::config::{PollConfig, RegistryConfig};
use hive_core::net::next_available_port;
use hive_core::RegistryError;
use hive_protocol::{ObjectKind, Value};
use hive_registry::{
    Registry, RegistryClient, RegistryHandle, RegistryServer, RemoteEvent, RemoteLock, RemoteQueue,
};

fn fast_poll() -> PollConfig {
    PollConfig {
        interval_ms: 5,
        deadline_secs: None,
    }
}

fn registry_config() -> RegistryConfig {
    RegistryConfig {
        host: "127.0.0.1".to_string(),
        // OS-assigned base avoids clashing with parallel tests
        port_base: {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let port = listener.local_addr().unwrap().port();
            drop(listener);
            port
        },
    }
}

async fn start_server(registry: Arc<Registry>) -> RegistryHandle {
    RegistryServer::new(registry, &registry_config())
        .serve()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_handshake_rejects_bad_token() {
    let registry = Arc::new(Registry::new());
    let handle = start_server(registry).await;

    let mut endpoint = handle.endpoint.clone();
    endpoint.token = "0".repeat(64);

    let result = RegistryClient::connect(&endpoint).await;
    assert!(matches!(
        result,
        Err(RegistryError::AuthenticationFailed)
    ));

    handle.shutdown();
}

#[tokio::test]
async fn test_list_accessors_in_order() {
    let registry = Arc::new(Registry::new());
    registry.create_object("ports", ObjectKind::Queue).unwrap();
    registry.create_object("claim", ObjectKind::Lock).unwrap();
    registry.register_accessor("get_ports", "ports").unwrap();
    registry.register_accessor("get_claim", "claim").unwrap();
    let handle = start_server(registry).await;

    let mut client = RegistryClient::connect(&handle.endpoint).await.unwrap();
    let accessors = client.list_accessors().await.unwrap();
    let names: Vec<&str> = accessors.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["get_ports", "get_claim"]);

    handle.shutdown();
}

#[tokio::test]
async fn test_unknown_accessor_is_an_error() {
    let registry = Arc::new(Registry::new());
    let handle = start_server(registry).await;

    let mut lock = RemoteLock::open(&handle.endpoint, "missing", &fast_poll())
        .await
        .unwrap();
    let result = lock.try_acquire().await;
    assert!(matches!(result, Err(RegistryError::UnknownAccessor(_))));

    handle.shutdown();
}

#[tokio::test]
async fn test_lock_mutual_exclusion_over_tcp() {
    let registry = Arc::new(Registry::new());
    registry.create_object("claim", ObjectKind::Lock).unwrap();
    registry.register_accessor("get_claim", "claim").unwrap();
    let handle = start_server(Arc::clone(&registry)).await;

    let mut first = RemoteLock::open(&handle.endpoint, "get_claim", &fast_poll())
        .await
        .unwrap();
    let mut second = RemoteLock::open(&handle.endpoint, "get_claim", &fast_poll())
        .await
        .unwrap();

    first.acquire().await.unwrap();
    assert!(!second.try_acquire().await.unwrap());
    assert!(second.locked().await.unwrap());

    first.release().await.unwrap();
    // Polling acquire now wins
    second.acquire().await.unwrap();
    assert!(registry.lock("claim").unwrap().locked());

    second.release().await.unwrap();
    handle.shutdown();
}

#[tokio::test]
async fn test_event_broadcast_to_pollers() {
    let registry = Arc::new(Registry::new());
    registry
        .create_object("published", ObjectKind::Event)
        .unwrap();
    registry
        .register_accessor("get_published", "published")
        .unwrap();
    let handle = start_server(Arc::clone(&registry)).await;

    let mut waiters = Vec::new();
    for _ in 0..3 {
        let endpoint = handle.endpoint.clone();
        waiters.push(tokio::spawn(async move {
            let mut event = RemoteEvent::open(&endpoint, "get_published", &fast_poll())
                .await
                .unwrap();
            event.wait().await.unwrap();
        }));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    registry.event("published").unwrap().set();

    for waiter in waiters {
        waiter.await.unwrap();
    }
    handle.shutdown();
}

#[tokio::test]
async fn test_barrier_gathers_all_contributions() {
    let registry = Arc::new(Registry::new());
    registry.create_object("ports", ObjectKind::Queue).unwrap();
    registry.register_accessor("get_ports", "ports").unwrap();
    registry.queue("ports").unwrap().attach_counter();
    let handle = start_server(Arc::clone(&registry)).await;

    for i in 0..3u16 {
        let endpoint = handle.endpoint.clone();
        tokio::spawn(async move {
            let mut queue = RemoteQueue::open(&endpoint, "get_ports", &fast_poll())
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(5 * u64::from(i))).await;
            queue.put(Value::Int(i64::from(9000 + i)), 1).await.unwrap();
        });
    }

    let items = registry
        .queue("ports")
        .unwrap()
        .wait_for_count(3, Duration::from_millis(5), Some(Duration::from_secs(5)))
        .await
        .unwrap();

    let mut ports: Vec<i64> = items.iter().filter_map(|v| v.as_int()).collect();
    ports.sort_unstable();
    assert_eq!(ports, vec![9000, 9001, 9002]);
    handle.shutdown();
}

#[tokio::test]
async fn test_broadcast_fanout_delivers_to_every_consumer() {
    let registry = Arc::new(Registry::new());
    registry.create_object("urls", ObjectKind::Queue).unwrap();
    registry.register_accessor("get_urls", "urls").unwrap();
    let handle = start_server(Arc::clone(&registry)).await;

    registry
        .queue("urls")
        .unwrap()
        .put(Value::Text("https://hive.example".to_string()), 3);

    for _ in 0..3 {
        let mut queue = RemoteQueue::open(&handle.endpoint, "get_urls", &fast_poll())
            .await
            .unwrap();
        assert_eq!(
            queue.get().await.unwrap(),
            Some(Value::Text("https://hive.example".to_string()))
        );
    }
    assert!(registry.queue("urls").unwrap().is_empty());
    handle.shutdown();
}

/// Full port-claim round: each simulated worker takes the lock, pops a
/// candidate from the queue, probes forward to a free port, binds it
/// while still holding the lock, then puts the claimed port back for
/// the next claimant.
#[tokio::test]
async fn test_claim_under_lock_yields_distinct_bound_ports() {
    let registry = Arc::new(Registry::new());
    registry.create_object("ports", ObjectKind::Queue).unwrap();
    registry.create_object("claim", ObjectKind::Lock).unwrap();
    registry.register_accessor("get_ports", "ports").unwrap();
    registry.register_accessor("get_claim", "claim").unwrap();

    let ports = registry.queue("ports").unwrap();
    ports.attach_counter();

    // Seed from an OS-assigned port so the test never trips over a
    // developer's running services
    let seed = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    };
    ports.put(Value::Int(i64::from(seed)), 1);
    ports.reset_counter();

    let handle = start_server(Arc::clone(&registry)).await;

    let mut workers = Vec::new();
    for _ in 0..3 {
        let endpoint = handle.endpoint.clone();
        workers.push(tokio::spawn(async move {
            let mut lock = RemoteLock::open(&endpoint, "get_claim", &fast_poll())
                .await
                .unwrap();
            let mut queue = RemoteQueue::open(&endpoint, "get_ports", &fast_poll())
                .await
                .unwrap();

            lock.acquire().await.unwrap();
            let candidate = queue
                .get()
                .await
                .unwrap()
                .and_then(|v| v.as_int())
                .unwrap() as u16;
            let port = next_available_port(candidate).unwrap();
            // Bind before releasing: the next claimant's probe must see
            // this port occupied
            let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
            queue.put(Value::Int(i64::from(port)), 1).await.unwrap();
            lock.release().await.unwrap();

            (port, listener)
        }));
    }

    let claimed = ports
        .wait_for_count(3, Duration::from_millis(5), Some(Duration::from_secs(10)))
        .await
        .unwrap();

    let mut bound = Vec::new();
    for worker in workers {
        let (port, listener) = worker.await.unwrap();
        bound.push(port);
        drop(listener);
    }
    bound.sort_unstable();
    bound.dedup();
    assert_eq!(bound.len(), 3, "claimed ports must be distinct");

    let mut counted: Vec<i64> = claimed.iter().filter_map(|v| v.as_int()).collect();
    counted.sort_unstable();
    assert_eq!(
        counted,
        bound.iter().map(|&p| i64::from(p)).collect::<Vec<_>>(),
        "barrier must have counted exactly the bound ports"
    );

    // The queue still holds the final claimant's leftover put
    assert_eq!(ports.len(), 1);
    let last = ports.get_last().and_then(|v| v.as_int()).unwrap();
    assert!(bound.contains(&(last as u16)));
    assert!(ports.is_empty());

    handle.shutdown();
}

#[tokio::test]
async fn test_deadline_bounds_wait_on_abandoned_lock() {
    let registry = Arc::new(Registry::new());
    registry.create_object("claim", ObjectKind::Lock).unwrap();
    registry.register_accessor("get_claim", "claim").unwrap();
    let handle = start_server(Arc::clone(&registry)).await;

    // Simulate a holder that died without releasing
    assert!(registry.lock("claim").unwrap().try_acquire());

    let poll = PollConfig {
        interval_ms: 5,
        deadline_secs: Some(1),
    };
    let mut lock = RemoteLock::open(&handle.endpoint, "get_claim", &poll)
        .await
        .unwrap();
    let result = lock.acquire().await;
    assert!(matches!(
        result,
        Err(RegistryError::DeadlineExceeded { .. })
    ));

    handle.shutdown();
}
