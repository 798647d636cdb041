use std::time::Duration;

/// Time allowed to write a frame (or a coalesced batch of frames) to the peer.
pub const WS_WRITE_WAIT: Duration = Duration::from_secs(10);

/// Read-inactivity window.
///
/// Any inbound frame, pongs included, pushes the deadline forward. If
/// nothing arrives within this window the peer is considered dead.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// How often the server pings the peer. Must be shorter than [`WS_PONG_WAIT`].
pub const WS_PING_PERIOD: Duration = ping_period(WS_PONG_WAIT);

/// Maximum inbound message size in bytes.
pub const WS_MAX_MESSAGE_SIZE: usize = 512;

/// Default per-client mailbox capacity.
pub const MAILBOX_CAPACITY: usize = 256;

/// Default capacity of the hub's broadcast queue.
pub const BROADCAST_QUEUE_SIZE: usize = 256;

/// Keepalive period for a given read window: nine tenths of it.
pub const fn ping_period(pong_wait: Duration) -> Duration {
    Duration::from_millis(pong_wait.as_millis() as u64 * 9 / 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_period_is_shorter_than_pong_wait() {
        assert_eq!(WS_PING_PERIOD, Duration::from_secs(54));
        assert!(WS_PING_PERIOD < WS_PONG_WAIT);
    }

    #[test]
    fn ping_period_scales_with_window() {
        assert_eq!(ping_period(Duration::from_secs(10)), Duration::from_secs(9));
        assert_eq!(ping_period(Duration::from_secs(1)), Duration::from_millis(900));
        for secs in 1..=300 {
            let wait = Duration::from_secs(secs);
            assert!(ping_period(wait) < wait, "period must stay below {secs}s");
        }
    }

    #[test]
    fn write_wait_fits_inside_ping_period() {
        assert!(WS_WRITE_WAIT < WS_PING_PERIOD);
    }
}
