use axum::http::HeaderValue;
use std::sync::Arc;

use crate::chat::broadcast::BroadcastChannel;
use crate::chat::presence::PresenceCoordinator;
use crate::ws::actor::Heartbeat;
use crate::ws::new_connection_table;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Identity registry and online/offline notifications
    pub presence: Arc<PresenceCoordinator>,
    /// Chat message fan-out
    pub broadcast: Arc<BroadcastChannel>,
    /// Browser origin allowed to open the channel (None = any)
    pub allowed_origin: Option<HeaderValue>,
    /// Ping/pong timings used to drop unresponsive connections
    pub heartbeat: Heartbeat,
}

impl AppState {
    pub fn new() -> Self {
        // Presence and broadcast share one table of open sockets
        let connections = new_connection_table();
        Self {
            presence: Arc::new(PresenceCoordinator::new(connections.clone())),
            broadcast: Arc::new(BroadcastChannel::new(connections)),
            allowed_origin: None,
            heartbeat: Heartbeat::default(),
        }
    }

    pub fn with_allowed_origin(mut self, origin: HeaderValue) -> Self {
        self.allowed_origin = Some(origin);
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
