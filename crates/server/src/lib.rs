//! Broadcast hub for chathub.
//!
//! Accepts any number of WebSocket peers, relays every inbound message to
//! all registered peers through a single [`Hub`] control loop, and keeps an
//! in-memory history of accepted messages.
//!
//! Each connection runs a pump pair: a read pump feeding the hub's
//! broadcast queue and a write pump draining the client's mailbox with
//! periodic pings in between.

mod client;
mod history;
mod hub;
mod pumps;
mod render;
mod server;
mod transport;

pub use client::spawn_client;
pub use history::History;
pub use hub::{Client, Hub, HubClosed, HubConfig, HubHandle};
pub use pumps::PumpConfig;
pub use render::{HtmlRenderer, JsonRenderer, RenderError, Renderer};
pub use server::{ChatServer, ServerConfig};
pub use transport::Transport;

/// Errors produced by the chat server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("write deadline exceeded")]
    WriteTimeout,

    #[error("hub is not running")]
    HubClosed(#[from] HubClosed),
}
