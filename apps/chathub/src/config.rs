//! Server configuration.
//!
//! Read from the TOML file named by `$CHATHUB_CONFIG`, else `chathub.toml`
//! in the working directory. Missing files and missing fields fall back to
//! defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use chathub_protocol::constants::{
    BROADCAST_QUEUE_SIZE, MAILBOX_CAPACITY, WS_MAX_MESSAGE_SIZE, WS_PONG_WAIT, WS_WRITE_WAIT,
};
use chathub_server::{HubConfig, PumpConfig, ServerConfig};
use serde::{Deserialize, Serialize};

const CONFIG_ENV: &str = "CHATHUB_CONFIG";
const DEFAULT_FILE: &str = "chathub.toml";

/// Which renderer turns messages into outbound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// htmx out-of-band HTML fragment.
    #[default]
    Html,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Interface to listen on.
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    /// TCP port (0 = auto-assign).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request path upgraded to WebSocket.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    #[serde(default)]
    pub renderer: RendererKind,

    /// Outbound frames buffered per client before it is evicted.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Messages buffered between read pumps and the hub.
    #[serde(default = "default_broadcast_queue")]
    pub broadcast_queue: usize,

    /// Retained history entries; unset keeps everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,

    /// Send recent history to clients when they connect.
    #[serde(default)]
    pub replay_history: bool,

    /// Read-inactivity window in seconds.
    #[serde(default = "default_pong_wait_secs")]
    pub pong_wait_secs: u64,

    /// Write deadline in seconds.
    #[serde(default = "default_write_wait_secs")]
    pub write_wait_secs: u64,

    /// Largest accepted inbound message in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    3000
}

fn default_ws_path() -> String {
    "/ws".into()
}

fn default_mailbox_capacity() -> usize {
    MAILBOX_CAPACITY
}

fn default_broadcast_queue() -> usize {
    BROADCAST_QUEUE_SIZE
}

fn default_pong_wait_secs() -> u64 {
    WS_PONG_WAIT.as_secs()
}

fn default_write_wait_secs() -> u64 {
    WS_WRITE_WAIT.as_secs()
}

fn default_max_message_size() -> usize {
    WS_MAX_MESSAGE_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            ws_path: default_ws_path(),
            renderer: RendererKind::default(),
            mailbox_capacity: default_mailbox_capacity(),
            broadcast_queue: default_broadcast_queue(),
            history_limit: None,
            replay_history: false,
            pong_wait_secs: default_pong_wait_secs(),
            write_wait_secs: default_write_wait_secs(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Config {
    /// Loads configuration from the default location, or defaults if no
    /// file exists there.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();
        if path.exists() {
            Self::from_path(&path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Loads and validates the configuration at `path`.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration read");
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.ws_path.starts_with('/') {
            bail!("ws_path must start with '/': {:?}", self.ws_path);
        }
        if self.mailbox_capacity == 0 {
            bail!("mailbox_capacity must be > 0");
        }
        if self.broadcast_queue == 0 {
            bail!("broadcast_queue must be > 0");
        }
        if self.history_limit == Some(0) {
            bail!("history_limit must be > 0 when set");
        }
        if self.pong_wait_secs == 0 {
            bail!("pong_wait_secs must be > 0");
        }
        if self.write_wait_secs == 0 {
            bail!("write_wait_secs must be > 0");
        }
        if self.max_message_size == 0 {
            bail!("max_message_size must be > 0");
        }
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            addr: SocketAddr::new(self.bind, self.port),
            ws_path: self.ws_path.clone(),
            pump: PumpConfig {
                pong_wait: Duration::from_secs(self.pong_wait_secs),
                write_wait: Duration::from_secs(self.write_wait_secs),
                max_message_size: self.max_message_size,
                mailbox_capacity: self.mailbox_capacity,
            },
        }
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            broadcast_queue: self.broadcast_queue,
            history_limit: self.history_limit,
            replay_history: self.replay_history,
        }
    }
}

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.ws_path, "/ws");
        assert_eq!(config.renderer, RendererKind::Html);
        assert_eq!(config.mailbox_capacity, 256);
        assert_eq!(config.history_limit, None);
        assert!(!config.replay_history);
        assert_eq!(config.pong_wait_secs, 60);
        assert_eq!(config.write_wait_secs, 10);
        assert_eq!(config.max_message_size, 512);
        config.validate().unwrap();
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = write_config("");
        let config = Config::from_path(file.path()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind, default_bind());
    }

    #[test]
    fn partial_file_overrides_fields() {
        let file = write_config(
            r#"
bind = "127.0.0.1"
port = 8080
renderer = "json"
history_limit = 100
replay_history = true
"#,
        );
        let config = Config::from_path(file.path()).unwrap();
        assert_eq!(config.bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, 8080);
        assert_eq!(config.renderer, RendererKind::Json);
        assert_eq!(config.history_limit, Some(100));
        assert!(config.replay_history);
        assert_eq!(config.ws_path, "/ws");
    }

    #[test]
    fn rejects_invalid_values() {
        for bad in [
            "mailbox_capacity = 0",
            "broadcast_queue = 0",
            "history_limit = 0",
            "pong_wait_secs = 0",
            "write_wait_secs = 0",
            "max_message_size = 0",
            "ws_path = \"ws\"",
        ] {
            let file = write_config(bad);
            assert!(Config::from_path(file.path()).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn rejects_unknown_renderer() {
        let file = write_config("renderer = \"xml\"");
        assert!(Config::from_path(file.path()).is_err());
    }

    #[test]
    fn converts_to_server_and_hub_config() {
        let config = Config {
            port: 4000,
            pong_wait_secs: 30,
            history_limit: Some(10),
            ..Config::default()
        };

        let server = config.server_config();
        assert_eq!(server.addr.port(), 4000);
        assert_eq!(server.pump.pong_wait, Duration::from_secs(30));
        assert_eq!(server.pump.ping_period(), Duration::from_secs(27));
        assert_eq!(server.pump.write_wait, Duration::from_secs(10));

        let hub = config.hub_config();
        assert_eq!(hub.history_limit, Some(10));
        assert_eq!(hub.broadcast_queue, 256);
    }

    #[test]
    fn serializes_back_to_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("port = 3000"));
        assert!(text.contains("renderer = \"html\""));
        assert!(!text.contains("history_limit"));
    }
}
