use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::AppState;
use crate::ws::protocol::{self, ProtocolError};
use crate::ws::ConnectionId;

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Keeps half-open connections from holding a presence entry forever.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Liveness check timings for every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            interval: PING_INTERVAL,
            timeout: PONG_TIMEOUT,
        }
    }
}

/// Run the actor-per-connection pattern for one WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Ping task: ends when a pong is overdue, which also ends the reader loop
/// - Reader loop: decodes incoming events and dispatches them
///
/// The mpsc sender is what the connection table stores, so broadcasts never
/// wait on this socket's I/O.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::new();
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let mut presence = state.presence.attach(connection_id, tx.clone());

    tracing::info!(connection_id = %connection_id, "WebSocket actor started");

    // Spawn writer task: forwards mpsc messages to WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let heartbeat = state.heartbeat;
    let mut ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(heartbeat.interval);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            // Pongs that arrived unasked do not count towards this round
            while pong_rx.try_recv().is_ok() {}

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died, connection is gone
                break;
            }

            match timeout(heartbeat.timeout, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!(connection_id = %connection_id, "Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages
    loop {
        let frame = tokio::select! {
            frame = ws_receiver.next() => frame,
            _ = &mut ping_handle => {
                tracing::info!(connection_id = %connection_id, "Heartbeat stopped, dropping connection");
                break;
            }
        };

        match frame {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(
                        text.as_str(),
                        connection_id,
                        &mut presence,
                        &tx,
                        &state,
                    );
                }
                Message::Binary(_) => {
                    tracing::debug!(connection_id = %connection_id, "Received binary frame");
                    protocol::send_error(&tx, &ProtocolError::UnsupportedFrame);
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        connection_id = %connection_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(connection_id = %connection_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks
    writer_handle.abort();
    ping_handle.abort();

    // Leave the connection table and broadcast the departure, if announced
    state.presence.detach(connection_id, &mut presence);

    tracing::info!(
        connection_id = %connection_id,
        open_connections = state.presence.open_connections(),
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed, connection is broken
            break;
        }
    }
}
