//! Wire types for chathub.
//!
//! Inbound frames follow the htmx WebSocket extension format
//! (`{"HEADERS": {...}, "text": "..."}`); outbound frames are whatever the
//! server's renderer produces from a [`Message`].

pub mod constants;
pub mod message;

pub use message::{ClientId, InboundFrame, Message};
