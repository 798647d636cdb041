//! The hub: registry of connected clients, message history and the single
//! control loop that mutates both.

use std::collections::HashMap;
use std::sync::Arc;

use chathub_protocol::constants::BROADCAST_QUEUE_SIZE;
use chathub_protocol::{ClientId, Message};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::history::History;
use crate::render::Renderer;

/// Hub tuning.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of the broadcast queue. Read pumps wait when it is full.
    pub broadcast_queue: usize,
    /// Maximum retained history entries (`None` or `Some(0)` = unbounded).
    pub history_limit: Option<usize>,
    /// Replay recent history into every new client's mailbox, using at
    /// most half of its free capacity.
    pub replay_history: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            broadcast_queue: BROADCAST_QUEUE_SIZE,
            history_limit: None,
            replay_history: false,
        }
    }
}

/// A registered peer: its id and the sending half of its mailbox.
///
/// The registry holds the only sender, so dropping the `Client` closes
/// the mailbox and lets the write pump finish.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    mailbox: mpsc::Sender<WsMessage>,
}

impl Client {
    pub fn new(id: ClientId, mailbox: mpsc::Sender<WsMessage>) -> Self {
        Self { id, mailbox }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }
}

/// Returned when enqueueing on a hub whose control loop has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("hub is not running")]
pub struct HubClosed;

#[derive(Debug)]
struct HubState {
    clients: HashMap<ClientId, Client>,
    history: History,
}

/// The control loop. Build with [`Hub::new`], then drive with [`Hub::run`].
pub struct Hub {
    state: Arc<RwLock<HubState>>,
    renderer: Arc<dyn Renderer>,
    replay_history: bool,
    register_rx: mpsc::UnboundedReceiver<Client>,
    unregister_rx: mpsc::UnboundedReceiver<ClientId>,
    broadcast_rx: mpsc::Receiver<Message>,
}

/// Cloneable entry point to a running [`Hub`].
#[derive(Clone)]
pub struct HubHandle {
    state: Arc<RwLock<HubState>>,
    register_tx: mpsc::UnboundedSender<Client>,
    unregister_tx: mpsc::UnboundedSender<ClientId>,
    broadcast_tx: mpsc::Sender<Message>,
}

impl Hub {
    /// Creates a hub and the handle used to feed it.
    pub fn new(config: HubConfig, renderer: Arc<dyn Renderer>) -> (Self, HubHandle) {
        let state = Arc::new(RwLock::new(HubState {
            clients: HashMap::new(),
            history: History::new(config.history_limit.filter(|&limit| limit > 0)),
        }));
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_queue.max(1));

        let hub = Self {
            state: Arc::clone(&state),
            renderer,
            replay_history: config.replay_history,
            register_rx,
            unregister_rx,
            broadcast_rx,
        };
        let handle = HubHandle {
            state,
            register_tx,
            unregister_tx,
            broadcast_tx,
        };
        (hub, handle)
    }

    /// Runs the control loop until `cancel` fires or every handle is gone.
    ///
    /// On exit the registry is cleared, closing every mailbox.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            // Register is polled first so a client is always in the
            // registry before its own unregister is handled.
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                client = self.register_rx.recv() => match client {
                    Some(client) => self.on_register(client).await,
                    None => break,
                },

                id = self.unregister_rx.recv() => match id {
                    Some(id) => self.on_unregister(&id).await,
                    None => break,
                },

                message = self.broadcast_rx.recv() => match message {
                    Some(message) => self.on_broadcast(message).await,
                    None => break,
                },
            }
        }

        let mut state = self.state.write().await;
        let remaining = state.clients.len();
        state.clients.clear();
        info!(remaining, "hub stopped");
    }

    async fn on_register(&self, client: Client) {
        let mut state = self.state.write().await;

        if self.replay_history {
            // Half the mailbox stays free for live broadcasts, since the
            // write pump has not started draining it yet.
            let room = client.mailbox.capacity() / 2;
            let mut replayed = 0usize;
            for message in state.history.newest(room) {
                let Ok(text) = self.renderer.render(message) else {
                    continue;
                };
                if client.mailbox.try_send(WsMessage::Text(text.into())).is_err() {
                    break;
                }
                replayed += 1;
            }
            debug!(client = %client.id, replayed, "history replayed");
        }

        let id = client.id.clone();
        if state.clients.insert(id.clone(), client).is_some() {
            warn!(client = %id, "client registered twice, replacing previous entry");
        }
        info!(client = %id, clients = state.clients.len(), "client connected");
    }

    async fn on_unregister(&self, id: &ClientId) {
        let mut state = self.state.write().await;
        if state.clients.remove(id).is_some() {
            info!(client = %id, clients = state.clients.len(), "client disconnected");
        }
    }

    async fn on_broadcast(&self, message: Message) {
        let message = Arc::new(message);
        let mut state = self.state.write().await;
        state.history.push(Arc::clone(&message));

        let frame = match self.renderer.render(&message) {
            Ok(text) => WsMessage::Text(text.into()),
            Err(e) => {
                warn!(client = %message.client_id, "render failed, message not delivered: {e}");
                return;
            }
        };

        state
            .clients
            .retain(|id, client| match client.mailbox.try_send(frame.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    info!(client = %id, "client disconnected (mailbox full)");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(client = %id, "mailbox receiver gone, dropping client");
                    false
                }
            });
    }
}

impl HubHandle {
    /// Queues a client for registration.
    pub fn register(&self, client: Client) -> Result<(), HubClosed> {
        self.register_tx.send(client).map_err(|_| HubClosed)
    }

    /// Queues removal of a client. Unknown ids are ignored by the hub.
    pub fn unregister(&self, id: ClientId) -> Result<(), HubClosed> {
        self.unregister_tx.send(id).map_err(|_| HubClosed)
    }

    /// Queues a message for fan-out. Waits while the broadcast queue is full.
    pub async fn broadcast(&self, message: Message) -> Result<(), HubClosed> {
        self.broadcast_tx.send(message).await.map_err(|_| HubClosed)
    }

    /// Number of registered clients.
    pub async fn client_count(&self) -> usize {
        self.state.read().await.clients.len()
    }

    pub async fn contains(&self, id: &ClientId) -> bool {
        self.state.read().await.clients.contains_key(id)
    }

    /// Ids of registered clients, in no particular order.
    pub async fn client_ids(&self) -> Vec<ClientId> {
        self.state.read().await.clients.keys().cloned().collect()
    }

    /// Snapshot of the retained history, oldest first.
    pub async fn history(&self) -> Vec<Arc<Message>> {
        self.state.read().await.history.iter().cloned().collect()
    }

    /// Number of retained history entries.
    pub async fn history_len(&self) -> usize {
        self.state.read().await.history.len()
    }

    /// Number of messages ever accepted.
    pub async fn total_messages(&self) -> u64 {
        self.state.read().await.history.total()
    }

    /// Returns `true` once the control loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.broadcast_tx.is_closed()
    }
}
