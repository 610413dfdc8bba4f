//! Client-side mirror of presence and message history.
//!
//! `SessionState` holds no I/O. The connection layer feeds it server events
//! and lifecycle transitions; UIs read it through cheap snapshots.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::history::{HistoryEntry, MessageHistory};
use super::ClientError;
use crate::proto::ServerEvent;

/// Connection lifecycle as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Shared, immutable view of the online users.
/// Every change installs a new set, so a held snapshot never changes underneath a reader.
pub type PresenceSet = Arc<BTreeSet<String>>;

#[derive(Debug, Default)]
pub struct SessionState {
    identity: Option<String>,
    status: ConnectionStatus,
    online: PresenceSet,
    history: MessageHistory,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose the identity to announce. Blank identities never reach the server.
    pub fn set_identity(&mut self, user_id: &str) -> Result<(), ClientError> {
        if user_id.trim().is_empty() {
            return Err(ClientError::EmptyIdentity);
        }
        self.identity = Some(user_id.to_string());
        Ok(())
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn online_users(&self) -> PresenceSet {
        Arc::clone(&self.online)
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// Move to `Connecting` and hand back the identity to announce.
    /// `None` means there is nothing to do: no identity, or not disconnected.
    pub fn begin_connect(&mut self) -> Option<String> {
        if self.status != ConnectionStatus::Disconnected {
            return None;
        }
        let identity = self.identity.clone()?;
        self.status = ConnectionStatus::Connecting;
        Some(identity)
    }

    pub fn mark_connected(&mut self) {
        if self.status == ConnectionStatus::Connecting {
            self.status = ConnectionStatus::Connected;
        }
    }

    /// Drop to `Disconnected` and forget who is online. History is kept.
    /// Returns false if already disconnected.
    pub fn mark_disconnected(&mut self) -> bool {
        if self.status == ConnectionStatus::Disconnected {
            return false;
        }
        self.status = ConnectionStatus::Disconnected;
        self.online = PresenceSet::default();
        true
    }

    /// Record a local notice in history.
    pub fn push_info(&mut self, notice: impl Into<String>) {
        self.history.push_info(notice);
    }

    /// Apply one event from the server. Ignored while disconnected.
    pub fn apply(&mut self, event: ServerEvent) {
        if self.status == ConnectionStatus::Disconnected {
            return;
        }

        match event {
            ServerEvent::PresenceSnapshot(users) => {
                self.online = Arc::new(users.into_iter().collect());
            }
            ServerEvent::UserOnline(user_id) => {
                if !self.online.contains(&user_id) {
                    let mut next = BTreeSet::clone(&self.online);
                    next.insert(user_id);
                    self.online = Arc::new(next);
                }
            }
            ServerEvent::UserOffline(user_id) => {
                if self.online.contains(&user_id) {
                    let mut next = BTreeSet::clone(&self.online);
                    next.remove(&user_id);
                    self.online = Arc::new(next);
                }
            }
            ServerEvent::MessageDelivered(message) => {
                self.history.push(HistoryEntry::Message(message));
            }
            ServerEvent::Error(err) => {
                tracing::warn!(code = err.code, message = %err.message, "Server rejected event");
                self.history.push_info(format!("Server error {}: {}", err.code, err.message));
            }
        }
    }
}
