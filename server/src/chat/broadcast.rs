//! Chat message fan-out.
//! Stamps each published message and delivers it to every open connection.

use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};

use crate::proto::{ChatMessage, ServerEvent};
use crate::ws::broadcast::broadcast_to_all;
use crate::ws::ConnectionTable;

pub struct BroadcastChannel {
    connections: ConnectionTable,
    /// Timestamp of the last published message. New stamps never go below it.
    last_stamp: Mutex<DateTime<Utc>>,
}

impl BroadcastChannel {
    pub fn new(connections: ConnectionTable) -> Self {
        Self {
            connections,
            last_stamp: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// Build a message from `sender_id` and deliver it to everyone, sender included.
    /// Fire-and-forget: connections that are gone simply miss it.
    pub fn publish(&self, sender_id: &str, content: &str) -> ChatMessage {
        let mut last_stamp = self.last_stamp.lock().unwrap_or_else(PoisonError::into_inner);
        let timestamp = Utc::now().max(*last_stamp);
        *last_stamp = timestamp;

        let message = ChatMessage {
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            timestamp,
        };

        broadcast_to_all(
            &self.connections,
            &ServerEvent::MessageDelivered(message.clone()),
        );

        tracing::debug!(
            sender_id = %sender_id,
            recipients = self.connections.len(),
            "Message broadcast"
        );
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::{new_connection_table, ConnectionId};
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    fn delivered(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<ChatMessage> {
        let mut out = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            match serde_json::from_str(text.as_str()).unwrap() {
                ServerEvent::MessageDelivered(msg) => out.push(msg),
                other => panic!("Unexpected event: {:?}", other),
            }
        }
        out
    }

    #[test]
    fn test_publish_delivers_to_all_including_sender() {
        let table = new_connection_table();
        let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        table.insert(ConnectionId::new(), alice_tx);
        table.insert(ConnectionId::new(), bob_tx);
        let channel = BroadcastChannel::new(table);

        let sent = channel.publish("alice", "hi");

        for rx in [&mut alice_rx, &mut bob_rx] {
            let got = delivered(rx);
            assert_eq!(got.len(), 1);
            assert_eq!(got[0].sender_id, "alice");
            assert_eq!(got[0].content, "hi");
            assert_eq!(got[0], sent);
        }
    }

    #[test]
    fn test_timestamps_are_non_decreasing() {
        let table = new_connection_table();
        let (tx, mut rx) = mpsc::unbounded_channel();
        table.insert(ConnectionId::new(), tx);
        let channel = BroadcastChannel::new(table);

        for i in 0..50 {
            channel.publish("alice", &format!("msg {}", i));
        }

        let got = delivered(&mut rx);
        assert_eq!(got.len(), 50);
        assert!(got.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(got[49].content, "msg 49");
    }

    #[test]
    fn test_publish_with_no_connections_is_noop() {
        let channel = BroadcastChannel::new(new_connection_table());
        let msg = channel.publish("ghost", "anyone?");
        assert_eq!(msg.content, "anyone?");
    }
}
