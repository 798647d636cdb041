//! Chat WebSocket server.
//!
//! Listens on a TCP port, upgrades requests for the configured path to
//! WebSocket and hands each connection to the hub.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;

use crate::ServerError;
use crate::client::spawn_client;
use crate::hub::HubHandle;
use crate::pumps::PumpConfig;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind (port 0 = OS-assigned).
    pub addr: SocketAddr,
    /// Request path that is upgraded to WebSocket.
    pub ws_path: String,
    /// Per-connection limits.
    pub pump: PumpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: ([0, 0, 0, 0], 3000).into(),
            ws_path: "/ws".into(),
            pump: PumpConfig::default(),
        }
    }
}

/// Accepts chat connections and hands them to a [`HubHandle`].
pub struct ChatServer {
    config: ServerConfig,
    hub: HubHandle,
    cancel: CancellationToken,
    bound: OnceLock<SocketAddr>,
}

impl ChatServer {
    /// Creates a server. Client pumps hang off `cancel`, so cancelling it
    /// closes every chat connection too.
    pub fn new(config: ServerConfig, hub: HubHandle, cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            config,
            hub,
            cancel,
            bound: OnceLock::new(),
        })
    }

    /// Address of the listening socket, once [`run`](Self::run) has bound it.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.get().copied()
    }

    /// URL chat clients connect to, once bound.
    pub fn ws_url(&self) -> Option<String> {
        self.local_addr()
            .map(|addr| format!("ws://{addr}{}", self.config.ws_path))
    }

    /// Stops accepting and disconnects every client.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Accepts connections until cancelled.
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.addr).await?;
        let addr = listener.local_addr()?;
        let _ = self.bound.set(addr);
        tracing::info!(%addr, ws_path = %self.config.ws_path, "chat server listening");

        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer_addr)) => self.spawn_upgrade(stream, peer_addr),
                // Transient (e.g. EMFILE); keep serving connected clients.
                Err(e) => tracing::error!("accept error: {e}"),
            }
        }

        let clients = self.hub.client_count().await;
        tracing::info!(clients, "chat server shutting down");
        Ok(())
    }

    fn spawn_upgrade(self: &Arc<Self>, stream: TcpStream, peer_addr: SocketAddr) {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = server.handle_connection(stream, peer_addr).await {
                tracing::warn!(%peer_addr, "chat upgrade failed: {e}");
            }
        });
    }

    /// Upgrades one TCP connection and registers it with the hub.
    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.pump.max_message_size);
        ws_config.max_frame_size = Some(self.config.pump.max_message_size);

        let ws_path = self.config.ws_path.clone();
        let check_path = move |req: &Request, resp: Response| {
            if req.uri().path() == ws_path {
                Ok(resp)
            } else {
                let mut not_found = ErrorResponse::new(Some("404 not found".into()));
                *not_found.status_mut() = StatusCode::NOT_FOUND;
                Err(not_found)
            }
        };

        let ws_stream = accept_hdr_async_with_config(stream, check_path, Some(ws_config)).await?;

        let id = spawn_client(ws_stream, &self.hub, &self.config.pump, &self.cancel)?;
        tracing::debug!(%peer_addr, client = %id, "WebSocket connection established");
        Ok(())
    }
}
