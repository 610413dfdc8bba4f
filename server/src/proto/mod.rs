// Wire events exchanged over the chat WebSocket.
// Every frame is a JSON text frame of the form {"event": "<name>", "data": <payload>}.
// Event names are kebab-case, payload fields are camelCase:
//   client -> server: announce, publish-message
//   server -> client: presence-snapshot, user-online, user-offline, message-delivered, error

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message as delivered to every connected client.
/// Immutable once stamped by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload of a `publish-message` event. The server adds the timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishMessage {
    pub sender_id: String,
    pub content: String,
}

/// Payload of an `error` event: a frame the server refused at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub code: u16,
    pub message: String,
}

/// Events sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Announce(String),
    PublishMessage(PublishMessage),
}

/// Events sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    PresenceSnapshot(Vec<String>),
    UserOnline(String),
    UserOffline(String),
    MessageDelivered(ChatMessage),
    Error(ErrorEvent),
}

impl ServerEvent {
    /// Event name as it appears on the wire, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PresenceSnapshot(_) => "presence-snapshot",
            Self::UserOnline(_) => "user-online",
            Self::UserOffline(_) => "user-offline",
            Self::MessageDelivered(_) => "message-delivered",
            Self::Error(_) => "error",
        }
    }
}
