use futures_util::{Sink, Stream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

/// A duplex WebSocket connection as seen by the pumps.
///
/// Implemented for anything that is both a frame stream and a frame sink,
/// such as `WebSocketStream<TcpStream>` or an in-memory duplex in tests.
pub trait Transport:
    Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError> + Send + 'static
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<WsMessage, WsError>>
        + Sink<WsMessage, Error = WsError>
        + Send
        + 'static
{
}

/// Whether a read error is a normal way for a peer to go away.
pub(crate) fn is_expected_close(err: &WsError) -> bool {
    use tokio_tungstenite::tungstenite::error::ProtocolError;

    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::error::{CapacityError, ProtocolError};

    #[test]
    fn peer_going_away_is_expected() {
        assert!(is_expected_close(&WsError::ConnectionClosed));
        assert!(is_expected_close(&WsError::AlreadyClosed));
        assert!(is_expected_close(&WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake
        )));
        assert!(is_expected_close(&WsError::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset
        ))));
    }

    #[test]
    fn oversized_frames_are_unexpected() {
        let err = WsError::Capacity(CapacityError::MessageTooLong {
            size: 1024,
            max_size: 512,
        });
        assert!(!is_expected_close(&err));
    }
}
