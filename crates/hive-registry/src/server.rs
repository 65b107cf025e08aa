//! Registry TCP server
//!
//! Listens on loopback only; every connection must open with a `Hello`
//! carrying the per-run token before any operation is served.

use std::io;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use hive_core::auth::{self, validate_token};
use hive_core::config::RegistryConfig;
use hive_core::net::next_available_port;
use hive_core::{RegistryEndpoint, RegistryError};

use hive_protocol::{ErrorCode, Frame, FrameCodec, Message, ProtocolError, RequestId};

use crate::registry::Registry;

/// Running registry server: where it listens plus its shutdown switch
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    /// Address and token workers connect with
    pub endpoint: RegistryEndpoint,
    cancel: CancellationToken,
}

impl RegistryHandle {
    /// Stop accepting connections and drop in-flight sessions
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Serves a [`Registry`] over framed TCP
pub struct RegistryServer {
    registry: Arc<Registry>,
    host: String,
    port_base: u16,
    token: String,
}

impl RegistryServer {
    /// Create a server for `registry`, generating a fresh token.
    ///
    /// The token lives only in this process and in the startup specs
    /// handed to workers; it is never written to disk.
    pub fn new(registry: Arc<Registry>, config: &RegistryConfig) -> Self {
        Self {
            registry,
            host: config.host.clone(),
            port_base: config.port_base,
            token: auth::generate_token(),
        }
    }

    /// Bind the first free port at or above the configured base and
    /// start the accept loop in the background
    pub async fn serve(self) -> io::Result<RegistryHandle> {
        let port = next_available_port(self.port_base)?;
        let listener = TcpListener::bind((self.host.as_str(), port)).await?;
        let local = listener.local_addr()?;
        tracing::info!("registry listening on {}", local);

        let endpoint = RegistryEndpoint {
            host: self.host.clone(),
            port: local.port(),
            token: self.token.clone(),
        };
        let cancel = CancellationToken::new();

        let registry = Arc::clone(&self.registry);
        let token = self.token.clone();
        let accept_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = accept_cancel.cancelled() => {
                        tracing::debug!("registry server shutting down");
                        break;
                    }
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => {
                                if !peer.ip().is_loopback() {
                                    tracing::warn!("rejected non-loopback connection from {}", peer);
                                    continue;
                                }
                                let registry = Arc::clone(&registry);
                                let token = token.clone();
                                let session_cancel = accept_cancel.clone();
                                tokio::spawn(async move {
                                    if let Err(e) =
                                        handle_session(stream, registry, token, session_cancel).await
                                    {
                                        tracing::warn!("registry session error: {}", e);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("failed to accept registry connection: {}", e);
                            }
                        }
                    }
                }
            }
        });

        Ok(RegistryHandle { endpoint, cancel })
    }
}

async fn handle_session(
    stream: TcpStream,
    registry: Arc<Registry>,
    token: String,
    cancel: CancellationToken,
) -> Result<(), ProtocolError> {
    let mut framed = Framed::new(stream, FrameCodec::new());

    // First frame must be the handshake
    let hello = match framed.next().await {
        Some(frame) => frame?,
        None => return Ok(()),
    };
    match hello.message {
        Message::Hello { token: presented } => {
            if !validate_token(&presented, &token) {
                tracing::warn!("registry handshake rejected: bad token");
                framed
                    .send(Frame::new(
                        hello.request_id,
                        Message::HelloAck {
                            accepted: false,
                            reason: Some("authentication failed".to_string()),
                        },
                    ))
                    .await?;
                return Ok(());
            }
            framed
                .send(Frame::new(
                    hello.request_id,
                    Message::HelloAck {
                        accepted: true,
                        reason: None,
                    },
                ))
                .await?;
        }
        other => {
            framed
                .send(Frame::new(
                    hello.request_id,
                    error_message(
                        ErrorCode::AuthenticationRequired,
                        format!("expected hello, got {:?}", other.message_type()),
                    ),
                ))
                .await?;
            return Ok(());
        }
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = framed.next() => {
                let frame = match frame {
                    Some(frame) => frame?,
                    None => break,
                };
                let reply = dispatch(&registry, frame.request_id, frame.message);
                framed.send(reply).await?;
            }
        }
    }

    Ok(())
}

fn dispatch(registry: &Registry, request_id: RequestId, message: Message) -> Frame {
    let reply = match message {
        Message::Invoke { accessor, op } => {
            tracing::trace!("invoke {} on {}", op.name(), accessor);
            match registry.apply(&accessor, &op) {
                Ok(reply) => Message::Reply(reply),
                Err(e) => error_message(error_code(&e), e.to_string()),
            }
        }
        Message::ListAccessors => Message::Accessors(registry.list_accessors()),
        other => error_message(
            ErrorCode::InvalidMessage,
            format!("unexpected {:?}", other.message_type()),
        ),
    };
    Frame::new(request_id, reply)
}

fn error_message(code: ErrorCode, message: String) -> Message {
    Message::Error { code, message }
}

fn error_code(error: &RegistryError) -> ErrorCode {
    match error {
        RegistryError::UnknownAccessor(_) => ErrorCode::UnknownAccessor,
        RegistryError::WrongKind { .. } => ErrorCode::WrongKind,
        RegistryError::AuthenticationFailed => ErrorCode::AuthenticationFailed,
        _ => ErrorCode::Unknown,
    }
}
