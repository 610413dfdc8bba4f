//! Identity -> connection mapping for announced users.
//!
//! One entry per online identity. Registering an identity that is already
//! present replaces its connection handle (last writer wins); there is no
//! uniqueness check across concurrent logins.

use std::collections::{BTreeMap, BTreeSet};

use crate::ws::ConnectionId;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: BTreeMap<String, ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the mapping for `user_id`.
    /// Returns the handle it replaced, if any.
    pub fn register(&mut self, user_id: &str, connection_id: ConnectionId) -> Option<ConnectionId> {
        let previous = self.entries.insert(user_id.to_string(), connection_id);
        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            replaced = previous.is_some(),
            "Identity registered"
        );
        previous
    }

    /// Remove the first entry (in iteration order) whose handle is `connection_id`.
    /// Returns the identity that was removed.
    pub fn unregister(&mut self, connection_id: ConnectionId) -> Option<String> {
        let user_id = self
            .entries
            .iter()
            .find(|(_, handle)| **handle == connection_id)
            .map(|(user_id, _)| user_id.clone())?;

        self.entries.remove(&user_id);
        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            "Identity unregistered"
        );
        Some(user_id)
    }

    /// The set of identities currently registered.
    pub fn current_identities(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Connection currently holding `user_id`.
    pub fn connection_of(&self, user_id: &str) -> Option<ConnectionId> {
        self.entries.get(user_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
