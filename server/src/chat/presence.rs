//! Server-side presence tracking and broadcast.
//!
//! Each connection moves through `Unannounced -> Announced -> Closed`.
//! Registry mutations and the broadcasts they trigger happen under one lock,
//! so two connections closing at the same time each remove only their own
//! entry and their notifications go out in registry order.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::chat::registry::ConnectionRegistry;
use crate::proto::ServerEvent;
use crate::ws::broadcast::{broadcast_to_all, send_to_connection};
use crate::ws::{ConnectionId, ConnectionSender, ConnectionTable};

/// Presence state of a single connection, owned by its actor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PresenceState {
    #[default]
    Unannounced,
    Announced(String),
    Closed,
}

pub struct PresenceCoordinator {
    registry: Mutex<ConnectionRegistry>,
    connections: ConnectionTable,
}

impl PresenceCoordinator {
    pub fn new(connections: ConnectionTable) -> Self {
        Self {
            registry: Mutex::new(ConnectionRegistry::new()),
            connections,
        }
    }

    fn registry(&self) -> MutexGuard<'_, ConnectionRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transport connect: the socket starts receiving broadcasts but is not yet online.
    pub fn attach(&self, connection_id: ConnectionId, tx: ConnectionSender) -> PresenceState {
        self.connections.insert(connection_id, tx);
        tracing::debug!(
            connection_id = %connection_id,
            open_connections = self.open_connections(),
            "Connection attached"
        );
        PresenceState::Unannounced
    }

    /// Announce `user_id` on `connection_id`.
    ///
    /// The announcer first receives a snapshot of the identities that were
    /// already online, then everyone (announcer included) receives `user-online`.
    pub fn announce(&self, connection_id: ConnectionId, state: &mut PresenceState, user_id: &str) {
        if *state == PresenceState::Closed {
            return;
        }

        let mut registry = self.registry();

        let snapshot: Vec<String> = registry
            .current_identities()
            .into_iter()
            .filter(|id| id != user_id)
            .collect();

        registry.register(user_id, connection_id);
        *state = PresenceState::Announced(user_id.to_string());

        send_to_connection(
            &self.connections,
            connection_id,
            &ServerEvent::PresenceSnapshot(snapshot),
        );
        broadcast_to_all(&self.connections, &ServerEvent::UserOnline(user_id.to_string()));

        tracing::info!(
            user_id = %user_id,
            connection_id = %connection_id,
            online = registry.len(),
            "User connected"
        );
    }

    /// Transport close. Returns the identity that went offline, if any.
    pub fn detach(&self, connection_id: ConnectionId, state: &mut PresenceState) -> Option<String> {
        self.connections.remove(&connection_id);
        let previous = std::mem::replace(state, PresenceState::Closed);

        if !matches!(previous, PresenceState::Announced(_)) {
            tracing::debug!(connection_id = %connection_id, "Unannounced connection closed");
            return None;
        }

        let mut registry = self.registry();
        let user_id = registry.unregister(connection_id)?;

        broadcast_to_all(&self.connections, &ServerEvent::UserOffline(user_id.clone()));

        tracing::info!(
            user_id = %user_id,
            connection_id = %connection_id,
            online = registry.len(),
            "User disconnected"
        );
        Some(user_id)
    }

    /// Identities currently online.
    pub fn online_identities(&self) -> BTreeSet<String> {
        self.registry().current_identities()
    }

    /// Sockets currently receiving broadcasts, announced or not.
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::new_connection_table;
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    struct TestConn {
        id: ConnectionId,
        state: PresenceState,
        rx: mpsc::UnboundedReceiver<Message>,
    }

    fn connect(coordinator: &PresenceCoordinator) -> TestConn {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let state = coordinator.attach(id, tx);
        TestConn { id, state, rx }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Message::Text(text) = msg {
                events.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        events
    }

    fn online(name: &str) -> ServerEvent {
        ServerEvent::UserOnline(name.to_string())
    }

    #[test]
    fn test_first_announce_gets_empty_snapshot_then_own_online() {
        let coordinator = PresenceCoordinator::new(new_connection_table());
        let mut alice = connect(&coordinator);

        coordinator.announce(alice.id, &mut alice.state, "alice");

        assert_eq!(alice.state, PresenceState::Announced("alice".to_string()));
        assert_eq!(
            drain(&mut alice.rx),
            vec![ServerEvent::PresenceSnapshot(vec![]), online("alice")]
        );
    }

    #[test]
    fn test_second_announce_snapshot_and_broadcast() {
        let coordinator = PresenceCoordinator::new(new_connection_table());
        let mut alice = connect(&coordinator);
        let mut bob = connect(&coordinator);

        coordinator.announce(alice.id, &mut alice.state, "alice");
        drain(&mut alice.rx);
        drain(&mut bob.rx);

        coordinator.announce(bob.id, &mut bob.state, "bob");

        assert_eq!(drain(&mut alice.rx), vec![online("bob")]);
        assert_eq!(
            drain(&mut bob.rx),
            vec![
                ServerEvent::PresenceSnapshot(vec!["alice".to_string()]),
                online("bob")
            ]
        );
    }

    #[test]
    fn test_unannounced_connections_still_see_broadcasts() {
        let coordinator = PresenceCoordinator::new(new_connection_table());
        let mut alice = connect(&coordinator);
        let mut lurker = connect(&coordinator);

        coordinator.announce(alice.id, &mut alice.state, "alice");

        assert_eq!(drain(&mut lurker.rx), vec![online("alice")]);
    }

    #[test]
    fn test_detach_announced_broadcasts_offline_once_to_remaining() {
        let coordinator = PresenceCoordinator::new(new_connection_table());
        let mut alice = connect(&coordinator);
        let mut bob = connect(&coordinator);
        coordinator.announce(alice.id, &mut alice.state, "alice");
        coordinator.announce(bob.id, &mut bob.state, "bob");
        drain(&mut alice.rx);
        drain(&mut bob.rx);

        let gone = coordinator.detach(alice.id, &mut alice.state);

        assert_eq!(gone.as_deref(), Some("alice"));
        assert_eq!(alice.state, PresenceState::Closed);
        assert_eq!(
            drain(&mut bob.rx),
            vec![ServerEvent::UserOffline("alice".to_string())]
        );
        assert!(drain(&mut alice.rx).is_empty());
        assert_eq!(
            coordinator.online_identities(),
            BTreeSet::from(["bob".to_string()])
        );

        // A second close of the same connection is silent.
        assert_eq!(coordinator.detach(alice.id, &mut alice.state), None);
        assert!(drain(&mut bob.rx).is_empty());
    }

    #[test]
    fn test_detach_unannounced_is_silent() {
        let coordinator = PresenceCoordinator::new(new_connection_table());
        let mut alice = connect(&coordinator);
        let mut lurker = connect(&coordinator);
        coordinator.announce(alice.id, &mut alice.state, "alice");
        drain(&mut alice.rx);

        assert_eq!(coordinator.detach(lurker.id, &mut lurker.state), None);
        assert!(drain(&mut alice.rx).is_empty());
    }

    #[test]
    fn test_superseded_connection_close_keeps_new_owner_online() {
        let coordinator = PresenceCoordinator::new(new_connection_table());
        let mut first = connect(&coordinator);
        let mut second = connect(&coordinator);
        coordinator.announce(first.id, &mut first.state, "alice");
        coordinator.announce(second.id, &mut second.state, "alice");
        drain(&mut second.rx);

        assert_eq!(coordinator.detach(first.id, &mut first.state), None);
        assert!(drain(&mut second.rx).is_empty());
        assert_eq!(
            coordinator.online_identities(),
            BTreeSet::from(["alice".to_string()])
        );
    }

    #[test]
    fn test_reannounce_under_new_identity_leaves_stale_entry() {
        let coordinator = PresenceCoordinator::new(new_connection_table());
        let mut conn = connect(&coordinator);
        coordinator.announce(conn.id, &mut conn.state, "alice");
        coordinator.announce(conn.id, &mut conn.state, "alicia");

        assert_eq!(
            coordinator.online_identities(),
            BTreeSet::from(["alice".to_string(), "alicia".to_string()])
        );

        // Close removes one matching entry only.
        assert!(coordinator.detach(conn.id, &mut conn.state).is_some());
        assert_eq!(coordinator.online_identities().len(), 1);
    }

    #[test]
    fn test_concurrent_disconnects_remove_only_their_own_entries() {
        use std::sync::Arc;

        let coordinator = Arc::new(PresenceCoordinator::new(new_connection_table()));
        let mut conns: Vec<TestConn> = (0..16).map(|_| connect(&coordinator)).collect();
        for (i, conn) in conns.iter_mut().enumerate() {
            coordinator.announce(conn.id, &mut conn.state, &format!("user-{}", i));
        }

        let (leaving, staying) = conns.split_at_mut(8);
        let handles: Vec<_> = leaving
            .iter()
            .map(|conn| {
                let coordinator = Arc::clone(&coordinator);
                let id = conn.id;
                let mut state = conn.state.clone();
                std::thread::spawn(move || coordinator.detach(id, &mut state))
            })
            .collect();

        let mut gone: Vec<String> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        gone.sort();

        let mut expected: Vec<String> = (0..8).map(|i| format!("user-{}", i)).collect();
        expected.sort();
        assert_eq!(gone, expected);

        let remaining: BTreeSet<String> = (8..16).map(|i| format!("user-{}", i)).collect();
        assert_eq!(coordinator.online_identities(), remaining);

        // Each remaining connection saw exactly one offline per departed user.
        for conn in staying.iter_mut() {
            let offline: Vec<ServerEvent> = drain(&mut conn.rx)
                .into_iter()
                .filter(|e| matches!(e, ServerEvent::UserOffline(_)))
                .collect();
            assert_eq!(offline.len(), 8);
        }
    }
}
