//! Wiring of one accepted connection to the hub.

use chathub_protocol::ClientId;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use crate::hub::{Client, HubClosed, HubHandle};
use crate::pumps::{self, PumpConfig};
use crate::transport::Transport;

/// Registers a new client for `transport` and starts its pump pair.
///
/// The pumps run as background tasks and stop when the peer goes away,
/// the hub drops the client, or `parent` is cancelled.
pub fn spawn_client<T: Transport>(
    transport: T,
    hub: &HubHandle,
    config: &PumpConfig,
    parent: &CancellationToken,
) -> Result<ClientId, HubClosed> {
    let id = ClientId::generate();
    let (tx, rx) = mpsc::channel::<WsMessage>(config.mailbox_capacity.max(1));

    // Registration is queued before either pump can unregister.
    hub.register(Client::new(id.clone(), tx))?;

    let cancel = parent.child_token();
    let (sink, stream) = transport.split();

    tokio::spawn(pumps::write_pump(
        sink,
        rx,
        id.clone(),
        config.clone(),
        cancel.clone(),
    ));
    tokio::spawn(pumps::read_pump(
        stream,
        id.clone(),
        hub.clone(),
        config.clone(),
        cancel,
    ));

    Ok(id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::hub::{Hub, HubConfig};
    use crate::render::JsonRenderer;
    use futures_util::SinkExt;
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    const WAIT: Duration = Duration::from_secs(2);

    /// An in-memory WebSocket pair: (server side, client side).
    async fn ws_pair() -> (
        WebSocketStream<tokio::io::DuplexStream>,
        WebSocketStream<tokio::io::DuplexStream>,
    ) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(a, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(b, Role::Client, None).await;
        (server, client)
    }

    fn start_hub() -> HubHandle {
        let (hub_loop, hub) = Hub::new(HubConfig::default(), Arc::new(JsonRenderer));
        tokio::spawn(hub_loop.run(CancellationToken::new()));
        hub
    }

    async fn next_text(ws: &mut WebSocketStream<tokio::io::DuplexStream>) -> String {
        loop {
            let frame = tokio::time::timeout(WAIT, ws.next())
                .await
                .expect("peer timed out")
                .expect("stream ended")
                .expect("read error");
            if let WsMessage::Text(text) = frame {
                return text.as_str().to_owned();
            }
        }
    }

    async fn wait_for_count(hub: &HubHandle, expected: usize) {
        tokio::time::timeout(WAIT, async {
            while hub.client_count().await != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("client count never settled");
    }

    #[tokio::test]
    async fn two_peers_exchange_messages() {
        let hub = start_hub();
        let cancel = CancellationToken::new();
        let config = PumpConfig::default();

        let (server_a, mut peer_a) = ws_pair().await;
        let (server_b, mut peer_b) = ws_pair().await;
        let id_a = spawn_client(server_a, &hub, &config, &cancel).unwrap();
        spawn_client(server_b, &hub, &config, &cancel).unwrap();
        wait_for_count(&hub, 2).await;

        peer_a
            .send(WsMessage::Text(r#"{"HEADERS":{},"text":"hi"}"#.to_owned().into()))
            .await
            .unwrap();

        let expected = serde_json::json!({"clientId": id_a.as_str(), "text": "hi"});
        let got_b: serde_json::Value = serde_json::from_str(&next_text(&mut peer_b).await).unwrap();
        let got_a: serde_json::Value = serde_json::from_str(&next_text(&mut peer_a).await).unwrap();
        assert_eq!(got_b, expected);
        assert_eq!(got_a, expected);
    }

    #[tokio::test]
    async fn peer_close_unregisters_client() {
        let hub = start_hub();
        let cancel = CancellationToken::new();

        let (server_side, mut peer) = ws_pair().await;
        let id = spawn_client(server_side, &hub, &PumpConfig::default(), &cancel).unwrap();
        wait_for_count(&hub, 1).await;
        assert!(hub.contains(&id).await);

        peer.close(None).await.unwrap();
        wait_for_count(&hub, 0).await;
    }

    #[tokio::test]
    async fn parent_cancel_tears_down_pumps() {
        let hub = start_hub();
        let cancel = CancellationToken::new();

        let (server_side, mut peer) = ws_pair().await;
        spawn_client(server_side, &hub, &PumpConfig::default(), &cancel).unwrap();
        wait_for_count(&hub, 1).await;

        cancel.cancel();
        wait_for_count(&hub, 0).await;

        // The peer sees the connection end.
        let end = tokio::time::timeout(WAIT, async {
            loop {
                match peer.next().await {
                    Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(end.is_ok());
    }

    #[tokio::test]
    async fn closed_hub_refuses_new_clients() {
        let (hub_loop, hub) = Hub::new(HubConfig::default(), Arc::new(JsonRenderer));
        let stop = CancellationToken::new();
        let task = tokio::spawn(hub_loop.run(stop.clone()));
        stop.cancel();
        task.await.unwrap();

        let (server_side, _peer) = ws_pair().await;
        let result = spawn_client(server_side, &hub, &PumpConfig::default(), &CancellationToken::new());
        assert_eq!(result, Err(HubClosed));
    }
}
