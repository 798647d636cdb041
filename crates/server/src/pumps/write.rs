//! Write pump: mailbox to peer, with keepalive pings in between.

use std::time::Duration;

use chathub_protocol::ClientId;
use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::PumpConfig;
use crate::ServerError;

/// Drains the client's mailbox into the connection and pings the peer every
/// [`PumpConfig::ping_period`].
///
/// When the hub closes the mailbox a close frame is sent. On any exit the
/// connection token is cancelled, which also stops the read pump.
pub(crate) async fn write_pump<S>(
    mut sink: S,
    mut mailbox: mpsc::Receiver<WsMessage>,
    id: ClientId,
    config: PumpConfig,
    cancel: CancellationToken,
) where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    let _close = cancel.clone().drop_guard();

    let period = config.ping_period();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            frame = mailbox.recv() => {
                let Some(frame) = frame else {
                    debug!(client = %id, "mailbox closed, sending close frame");
                    let _ = write_frame(&mut sink, WsMessage::Close(None), config.write_wait).await;
                    break;
                };
                if let Err(e) = write_batch(&mut sink, &mut mailbox, frame, config.write_wait).await {
                    warn!(client = %id, "write error: {e}");
                    break;
                }
            }

            _ = ping.tick() => {
                trace!(client = %id, "sending ping");
                if let Err(e) = write_frame(&mut sink, WsMessage::Ping(Vec::new().into()), config.write_wait).await {
                    warn!(client = %id, "ping error: {e}");
                    break;
                }
            }
        }
    }

    let _ = tokio::time::timeout(config.write_wait, sink.close()).await;
}

/// Writes one frame and flushes it before `wait` elapses.
async fn write_frame<S>(sink: &mut S, frame: WsMessage, wait: Duration) -> Result<(), ServerError>
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    tokio::time::timeout(wait, sink.send(frame))
        .await
        .map_err(|_| ServerError::WriteTimeout)?
        .map_err(ServerError::from)
}

/// Writes `first` and every frame already queued behind it back-to-back,
/// with a single flush, before `wait` elapses.
async fn write_batch<S>(
    sink: &mut S,
    mailbox: &mut mpsc::Receiver<WsMessage>,
    first: WsMessage,
    wait: Duration,
) -> Result<(), ServerError>
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    let queued = mailbox.len();
    let batch = async {
        sink.feed(first).await?;
        for _ in 0..queued {
            match mailbox.try_recv() {
                Ok(frame) => sink.feed(frame).await?,
                Err(_) => break,
            }
        }
        sink.flush().await?;
        Ok::<(), WsError>(())
    };

    tokio::time::timeout(wait, batch)
        .await
        .map_err(|_| ServerError::WriteTimeout)?
        .map_err(ServerError::from)
}
