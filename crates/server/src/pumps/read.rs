//! Read pump: peer frames to the hub's broadcast queue.

use chathub_protocol::{ClientId, InboundFrame, Message};
use futures_util::{Stream, StreamExt};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::PumpConfig;
use crate::hub::HubHandle;
use crate::transport::is_expected_close;

/// Closes the connection and unregisters the client when the read pump
/// ends, however it ends.
struct Teardown {
    id: ClientId,
    hub: HubHandle,
    cancel: CancellationToken,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.cancel.cancel();
        let _ = self.hub.unregister(self.id.clone());
    }
}

/// Reads frames from the peer and submits them to the hub.
///
/// Any inbound frame pushes the read deadline forward by
/// [`PumpConfig::pong_wait`]; if nothing arrives in that window the peer is
/// considered dead. Payloads over [`PumpConfig::max_message_size`] end the
/// connection. Undecodable payloads are broadcast with empty text.
pub(crate) async fn read_pump<S>(
    mut stream: S,
    id: ClientId,
    hub: HubHandle,
    config: PumpConfig,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let _teardown = Teardown {
        id: id.clone(),
        hub: hub.clone(),
        cancel: cancel.clone(),
    };

    let deadline = tokio::time::sleep(config.pong_wait);
    tokio::pin!(deadline);

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut deadline => {
                warn!(client = %id, "read deadline exceeded, closing connection");
                break;
            }

            frame = stream.next() => match frame {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    if is_expected_close(&e) {
                        debug!(client = %id, "connection closed: {e}");
                    } else {
                        warn!(client = %id, "read error: {e}");
                    }
                    break;
                }
                None => {
                    debug!(client = %id, "stream ended");
                    break;
                }
            },
        };

        deadline.as_mut().reset(Instant::now() + config.pong_wait);

        let payload: &[u8] = match &frame {
            WsMessage::Text(text) => text.as_str().as_bytes(),
            WsMessage::Binary(data) => &data[..],
            WsMessage::Close(_) => {
                debug!(client = %id, "received close frame");
                break;
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => {
                trace!(client = %id, "keepalive");
                continue;
            }
            WsMessage::Frame(_) => continue,
        };

        if payload.len() > config.max_message_size {
            warn!(
                client = %id,
                "message exceeds max size ({} > {}), closing connection",
                payload.len(),
                config.max_message_size
            );
            break;
        }

        let text = match InboundFrame::decode(payload) {
            Ok(inbound) => inbound.text,
            Err(e) => {
                warn!(client = %id, "malformed message, broadcasting empty text: {e}");
                String::new()
            }
        };
        trace!(client = %id, %text, "received message");

        if hub.broadcast(Message::new(id.clone(), text)).await.is_err() {
            debug!(client = %id, "hub stopped, ending read pump");
            break;
        }
    }
}
