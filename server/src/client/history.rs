//! Bounded, display-only message log.

use std::collections::VecDeque;

use crate::proto::ChatMessage;

/// Maximum number of entries kept in a client's history.
pub const MAX_MESSAGES: usize = 20;

/// One line of client history: a delivered message or a local notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry {
    Message(ChatMessage),
    /// Local-only annotation, never sent to or received from the server.
    Info(String),
}

/// FIFO-capped log. Appending past capacity evicts the oldest entries first.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self::with_capacity(MAX_MESSAGES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.push(HistoryEntry::Message(message));
    }

    pub fn push_info(&mut self, notice: impl Into<String>) {
        self.push(HistoryEntry::Info(notice.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Delivered messages only, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter().filter_map(|entry| match entry {
            HistoryEntry::Message(msg) => Some(msg),
            HistoryEntry::Info(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new()
    }
}
