//! Chat server.
//!
//! Listens on a TCP port, hands every accepted socket to its own pair of
//! pumps, and runs the hub that owns all chat state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::connection::{self, ConnectionLimits};
use crate::dispatch::ChatState;
use crate::hub::Hub;
use crate::session::SessionId;
use crate::{EVENT_BUFFER_SIZE, ServerError};

/// The chat server.
pub struct ChatServer {
    config: ServerConfig,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
    next_id: AtomicU64,
}

impl ChatServer {
    /// Creates a server; nothing is bound until [`run`](Self::run).
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Gracefully shuts down the server.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the server until [`shutdown`](Self::shutdown).
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        self.config.validate()?;

        let listener = TcpListener::bind(self.config.listen_addr()).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!(
            max_clients = self.config.max_clients,
            max_channels = self.config.max_channels,
            "chat server listening on {local_addr}"
        );

        let (events, rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        let state = ChatState::new(self.config.max_clients, self.config.max_channels);
        let hub = tokio::spawn(Hub::new(state).run(rx, self.cancel.clone()));

        let limits = ConnectionLimits {
            max_payload: self.config.max_payload,
            send_buffer: self.config.send_buffer,
        };

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("server shutting down");
                    break;
                }

                result = listener.accept() => match result {
                    Ok((stream, peer_addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::debug!(%peer_addr, "set_nodelay failed: {e}");
                        }
                        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
                        tracing::info!(session = %id, %peer_addr, "connection accepted");
                        connection::spawn_connection(
                            stream,
                            id,
                            peer_addr,
                            limits,
                            events.clone(),
                            self.cancel.clone(),
                        );
                    }
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                    }
                },
            }
        }

        drop(events);
        hub.await?;
        *self.local_addr.lock().await = None;
        Ok(())
    }
}
