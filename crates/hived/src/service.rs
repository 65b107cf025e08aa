//! Worker HTTP service
//!
//! The minimal callable surface a worker exposes on its claimed port:
//! the webhook receiver at the bare root path (the reverse proxy passes
//! `/` straight through) and a health probe. The listener is bound by
//! the claim protocol before this module is handed the socket.

use std::io;
use std::net::TcpListener;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;

/// Build the worker's router
pub fn router() -> Router {
    Router::new()
        .route("/", post(receive_update))
        .route("/healthz", get(healthz))
}

async fn receive_update(body: String) -> StatusCode {
    tracing::debug!("received update ({} bytes)", body.len());
    StatusCode::OK
}

async fn healthz() -> &'static str {
    "ok"
}

/// Serve on an already-bound listener until `shutdown` fires.
///
/// Taking a bound std listener (rather than an address) is what lets
/// the claim protocol bind while holding the shared lock and start
/// serving later.
pub async fn serve(listener: TcpListener, shutdown: CancellationToken) -> io::Result<()> {
    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;
    let addr = listener.local_addr()?;
    tracing::info!("worker service listening on {}", addr);

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_healthz_and_webhook_receiver() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let shutdown = CancellationToken::new();

        let server = tokio::spawn(serve(listener, shutdown.clone()));

        let client = reqwest::Client::new();
        let health = client
            .get(format!("http://127.0.0.1:{}/healthz", port))
            .send()
            .await
            .unwrap();
        assert!(health.status().is_success());
        assert_eq!(health.text().await.unwrap(), "ok");

        let update = client
            .post(format!("http://127.0.0.1:{}/", port))
            .body(r#"{"update_id":1}"#)
            .send()
            .await
            .unwrap();
        assert!(update.status().is_success());

        shutdown.cancel();
        server.await.unwrap().unwrap();
    }
}
