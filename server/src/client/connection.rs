use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::history::MessageHistory;
use super::session::{ConnectionStatus, PresenceSet, SessionState};
use super::ClientError;
use crate::proto::{ClientEvent, PublishMessage, ServerEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A chat session bound to one server URL.
///
/// Constructed disconnected. `connect` opens the socket and announces the
/// identity; `disconnect` tears the socket down and clears presence.
pub struct ChatClient {
    url: String,
    session: Arc<Mutex<SessionState>>,
    link: Option<Link>,
}

/// The live socket: an outbound queue drained by the writer task, and the
/// reader task applying server events to the session.
struct Link {
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
}

impl Link {
    fn send(&self, event: &ClientEvent) -> Result<(), ClientError> {
        let json = serde_json::to_string(event)?;
        // A closed queue means the writer is gone; best effort only.
        let _ = self.outbound.send(Message::Text(json.into()));
        Ok(())
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        // Dropping `outbound` lets the writer close the socket on its own.
        self.reader.abort();
    }
}

fn lock(session: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChatClient {
    /// `url` is the channel endpoint, e.g. `ws://localhost:8001/ws`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session: Arc::new(Mutex::new(SessionState::new())),
            link: None,
        }
    }

    pub fn set_identity(&self, user_id: &str) -> Result<(), ClientError> {
        lock(&self.session).set_identity(user_id)
    }

    pub fn identity(&self) -> Option<String> {
        lock(&self.session).identity().map(str::to_string)
    }

    pub fn status(&self) -> ConnectionStatus {
        lock(&self.session).status()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.session).is_connected()
    }

    pub fn online_users(&self) -> PresenceSet {
        lock(&self.session).online_users()
    }

    pub fn history(&self) -> MessageHistory {
        lock(&self.session).history().clone()
    }

    /// Open the socket and announce. No-op without an identity or when
    /// already connecting/connected.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        let Some(identity) = lock(&self.session).begin_connect() else {
            return Ok(());
        };

        // A link left over from a server-side close is discarded.
        self.link = None;

        let ws = match connect_async(self.url.as_str()).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                lock(&self.session).mark_disconnected();
                tracing::warn!(url = %self.url, error = %e, "Failed to connect");
                return Err(e.into());
            }
        };

        lock(&self.session).mark_connected();

        let (sink, stream) = ws.split();
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        tokio::spawn(writer_task(sink, rx));
        let reader = tokio::spawn(reader_task(stream, Arc::clone(&self.session)));
        let link = Link {
            outbound: tx,
            reader,
        };

        if let Err(e) = link.send(&ClientEvent::Announce(identity.clone())) {
            lock(&self.session).mark_disconnected();
            return Err(e);
        }
        self.link = Some(link);

        tracing::info!(user_id = %identity, url = %self.url, "Connected and announced");
        Ok(())
    }

    /// Close the socket, clear the presence set, keep history.
    /// No-op when already disconnected.
    pub fn disconnect(&mut self) {
        let was_connected = lock(&self.session).mark_disconnected();
        self.link = None;

        if was_connected {
            tracing::info!(url = %self.url, "Disconnected");
        }
    }

    /// Publish a message as the current identity.
    /// No-op without an identity or without a live connection.
    pub fn send(&self, content: &str) -> Result<(), ClientError> {
        let (sender_id, connected) = {
            let session = lock(&self.session);
            (session.identity().map(str::to_string), session.is_connected())
        };
        let (Some(sender_id), true, Some(link)) = (sender_id, connected, self.link.as_ref()) else {
            return Ok(());
        };

        link.send(&ClientEvent::PublishMessage(PublishMessage {
            sender_id,
            content: content.to_string(),
        }))
    }
}

/// Writer task: forwards queued frames to the socket, then closes it once the queue is dropped.
async fn writer_task(mut sink: SplitSink<WsStream, Message>, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if sink.send(msg).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Reader task: applies server events until the socket closes.
async fn reader_task(mut stream: SplitStream<WsStream>, session: Arc<Mutex<SessionState>>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(text.as_str()) {
                Ok(event) => {
                    lock(&session).apply(event);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring undecodable server frame");
                }
            },
            Ok(Message::Close(frame)) => {
                tracing::info!(reason = ?frame, "Server closed connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    let mut session = lock(&session);
    if session.mark_disconnected() {
        session.push_info("Connection to server lost");
    }
}
