//! Client side of the chat channel: a session that connects to `/ws`,
//! announces an identity, and mirrors presence and recent messages.

pub mod avatar;
pub mod connection;
pub mod history;
pub mod session;

use thiserror::Error;

pub use connection::ChatClient;
pub use history::{HistoryEntry, MessageHistory, MAX_MESSAGES};
pub use session::{ConnectionStatus, PresenceSet, SessionState};

#[derive(Debug, Error)]
pub enum ClientError {
    /// Announce with a blank identity, rejected before anything is sent.
    #[error("User identity must not be empty")]
    EmptyIdentity,

    #[error("WebSocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}
