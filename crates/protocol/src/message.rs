use std::fmt;

use serde::{Deserialize, Serialize};

/// Process-unique identifier assigned to a connection when it is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generates a fresh random (UUID v4) identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A chat message accepted by the hub.
///
/// Immutable once built: the hub shares it between history and the
/// renderer without copying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "clientId")]
    pub client_id: ClientId,
    pub text: String,
}

impl Message {
    pub fn new(client_id: impl Into<ClientId>, text: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            text: text.into(),
        }
    }
}

/// Payload sent by a browser over the socket.
///
/// `HEADERS` is filled in by the htmx ws extension; it is kept but never
/// interpreted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "HEADERS", default)]
    pub headers: Option<serde_json::Value>,
    #[serde(default)]
    pub text: String,
}

impl InboundFrame {
    /// Decodes a raw frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
