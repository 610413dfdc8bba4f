use thiserror::Error;

use crate::chat::presence::PresenceState;
use crate::proto::{ClientEvent, ErrorEvent, PublishMessage, ServerEvent};
use crate::state::AppState;
use crate::ws::broadcast::send_event;
use crate::ws::{ConnectionId, ConnectionSender};

/// A frame rejected at the channel boundary, before dispatch.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Announce requires a non-empty user identity")]
    EmptyIdentity,

    #[error("Message content must not be empty")]
    EmptyContent,

    #[error("Binary frames are not supported")]
    UnsupportedFrame,
}

impl ProtocolError {
    pub fn code(&self) -> u16 {
        match self {
            Self::Malformed(_) => 400,
            Self::UnsupportedFrame => 415,
            Self::EmptyIdentity | Self::EmptyContent => 422,
        }
    }
}

/// Decode a text frame into a validated client event.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, ProtocolError> {
    let event: ClientEvent = serde_json::from_str(text)?;
    match event {
        ClientEvent::Announce(ref user_id) if user_id.trim().is_empty() => {
            Err(ProtocolError::EmptyIdentity)
        }
        ClientEvent::PublishMessage(ref msg) if msg.content.trim().is_empty() => {
            Err(ProtocolError::EmptyContent)
        }
        event => Ok(event),
    }
}

/// Handle an incoming text frame.
/// Decodes the event, dispatches it, and reports boundary errors to the sender.
pub fn handle_text_message(
    text: &str,
    connection_id: ConnectionId,
    presence: &mut PresenceState,
    tx: &ConnectionSender,
    state: &AppState,
) {
    match decode_client_event(text) {
        Ok(event) => dispatch_event(event, connection_id, presence, state),
        Err(e) => {
            tracing::warn!(
                connection_id = %connection_id,
                error = %e,
                "Rejected client frame"
            );
            send_error(tx, &e);
        }
    }
}

/// Dispatch a decoded event to the presence coordinator or broadcast channel.
fn dispatch_event(
    event: ClientEvent,
    connection_id: ConnectionId,
    presence: &mut PresenceState,
    state: &AppState,
) {
    match event {
        ClientEvent::Announce(user_id) => {
            state.presence.announce(connection_id, presence, &user_id);
        }
        ClientEvent::PublishMessage(PublishMessage { sender_id, content }) => {
            state.broadcast.publish(&sender_id, &content);
        }
    }
}

/// Send an error event describing a rejected frame.
pub fn send_error(tx: &ConnectionSender, error: &ProtocolError) {
    let event = ServerEvent::Error(ErrorEvent {
        code: error.code(),
        message: error.to_string(),
    });
    send_event(tx, &event);
}
