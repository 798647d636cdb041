//! Per-connection pump pair.

mod read;
mod write;

use std::time::Duration;

use chathub_protocol::constants::{
    MAILBOX_CAPACITY, WS_MAX_MESSAGE_SIZE, WS_PONG_WAIT, WS_WRITE_WAIT, ping_period,
};

pub(crate) use read::read_pump;
pub(crate) use write::write_pump;

/// Timing and size limits shared by both pumps of a connection.
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// Read-inactivity window; also sets the keepalive period.
    pub pong_wait: Duration,
    /// Deadline for each write (or coalesced batch).
    pub write_wait: Duration,
    /// Largest accepted inbound payload in bytes.
    pub max_message_size: usize,
    /// Outbound mailbox capacity.
    pub mailbox_capacity: usize,
}

impl PumpConfig {
    /// Keepalive period: nine tenths of the read window.
    pub fn ping_period(&self) -> Duration {
        ping_period(self.pong_wait)
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            pong_wait: WS_PONG_WAIT,
            write_wait: WS_WRITE_WAIT,
            max_message_size: WS_MAX_MESSAGE_SIZE,
            mailbox_capacity: MAILBOX_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PumpConfig::default();
        assert_eq!(config.pong_wait, Duration::from_secs(60));
        assert_eq!(config.ping_period(), Duration::from_secs(54));
        assert_eq!(config.write_wait, Duration::from_secs(10));
        assert_eq!(config.max_message_size, 512);
    }

    #[test]
    fn ping_period_follows_pong_wait() {
        let config = PumpConfig {
            pong_wait: Duration::from_secs(20),
            ..PumpConfig::default()
        };
        assert_eq!(config.ping_period(), Duration::from_secs(18));
    }
}
