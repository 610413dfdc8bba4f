use axum::extract::ws::Message;

use super::{ConnectionId, ConnectionSender, ConnectionTable};
use crate::proto::ServerEvent;

/// Encode a server event as a JSON text frame.
pub fn encode_event(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(event = event.name(), error = %e, "Failed to encode server event");
            None
        }
    }
}

/// Queue an event on a single connection's channel.
/// A closed channel means the connection is going away; the event is dropped.
pub fn send_event(tx: &ConnectionSender, event: &ServerEvent) {
    if let Some(msg) = encode_event(event) {
        let _ = tx.send(msg);
    }
}

/// Broadcast an event to every open connection.
pub fn broadcast_to_all(table: &ConnectionTable, event: &ServerEvent) {
    let Some(msg) = encode_event(event) else {
        return;
    };

    for entry in table.iter() {
        if entry.value().send(msg.clone()).is_err() {
            tracing::debug!(
                connection_id = %entry.key(),
                event = event.name(),
                "Skipped delivery to closed connection"
            );
        }
    }
}

/// Send an event to one connection, if it is still open.
pub fn send_to_connection(table: &ConnectionTable, connection_id: ConnectionId, event: &ServerEvent) {
    if let Some(tx) = table.get(&connection_id) {
        send_event(tx.value(), event);
    }
}
