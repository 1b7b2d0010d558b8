//! Ownership of the single live WebSocket connection.
//!
//! ```text
//!  ConnectionManager ── Outgoing (unbounded) ──► connection task ──► WebSocket
//!         ▲                                            │
//!         └──────────── LinkEvent (ordered) ───────────┘
//! ```
//!
//! Each `connect()` spawns one connection task with a fresh id. The task
//! decodes frames one at a time and reports them on a single channel, so the
//! session sees frames in arrival order. Events tagged with an id other than
//! the live one come from a connection that was already let go and are
//! ignored.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use life_core::{encode, flush, Diff, Overlay, OverlaySurface};

use crate::processor::DiffProcessor;
use crate::protocol::{SyncError, NORMAL_CLOSURE, REASON_REPLACED, REASON_SHUTDOWN};

/// Monotonically increasing connection identity.
pub type ConnectionId = u64;

/// State of the live connection as last reported by its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Report from a connection task.
#[derive(Debug)]
pub enum LinkEvent {
    /// The WebSocket handshake completed.
    Opened(ConnectionId),
    /// One inbound frame, decoded to text.
    Frame(ConnectionId, String),
    /// The server closed the connection or the transport failed.
    Closed {
        id: ConnectionId,
        reason: Option<String>,
    },
    /// The connection never opened.
    Failed { id: ConnectionId, error: SyncError },
}

impl LinkEvent {
    pub fn connection(&self) -> ConnectionId {
        match self {
            LinkEvent::Opened(id) | LinkEvent::Frame(id, _) => *id,
            LinkEvent::Closed { id, .. } | LinkEvent::Failed { id, .. } => *id,
        }
    }
}

enum Outgoing {
    Text(String),
    Close(String),
}

struct LiveConnection {
    id: ConnectionId,
    state: ConnectionState,
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

pub struct ConnectionManager {
    url: String,
    next_id: ConnectionId,
    live: Option<LiveConnection>,
    events: mpsc::Sender<LinkEvent>,
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>, events: mpsc::Sender<LinkEvent>) -> Self {
        Self {
            url: url.into(),
            next_id: 0,
            live: None,
            events,
        }
    }

    /// Open a new connection, replacing any live one.
    ///
    /// Returns immediately; the outcome arrives as a [`LinkEvent`].
    pub fn connect(&mut self) -> ConnectionId {
        if let Some(old) = self.live.take() {
            log::info!("Replacing connection {}", old.id);
            let _ = old.outgoing.send(Outgoing::Close(REASON_REPLACED.to_string()));
        }

        self.next_id += 1;
        let id = self.next_id;
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(
            id,
            self.url.clone(),
            outgoing_rx,
            self.events.clone(),
        ));
        self.live = Some(LiveConnection {
            id,
            state: ConnectionState::Connecting,
            outgoing: outgoing_tx,
        });
        log::info!("Connecting to {} (connection {id})", self.url);
        id
    }

    /// Close the live connection with a normal closure and `reason`, and
    /// discard everything buffered in the processor.
    pub fn disconnect(&mut self, reason: &str, processor: &mut DiffProcessor) {
        if let Some(live) = self.live.take() {
            log::info!("Disconnecting connection {}: {reason}", live.id);
            let _ = live.outgoing.send(Outgoing::Close(reason.to_string()));
        }
        processor.clear_buffer();
    }

    /// Flush the EditSet and send it as one frame.
    ///
    /// Does nothing, and leaves the edits in place, when there is nothing to
    /// send or the connection is not open. Returns the diff that was sent.
    pub fn submit<S: OverlaySurface>(
        &mut self,
        overlay: &mut Overlay<S>,
    ) -> Result<Option<Diff>, SyncError> {
        if overlay.is_empty() {
            return Ok(None);
        }
        let Some(live) = self.live.as_ref() else {
            return Ok(None);
        };
        if live.state != ConnectionState::Connected || live.outgoing.is_closed() {
            return Ok(None);
        }
        let diff = flush(overlay);
        let text = encode(&diff)?;
        live.outgoing
            .send(Outgoing::Text(text))
            .map_err(|_| SyncError::ConnectionClosed)?;
        log::debug!("Submitted {} cells on connection {}", diff.cell_count(), live.id);
        Ok(Some(diff))
    }

    /// Fold a connection event into the manager's view of the live
    /// connection. Returns `false` for events from a connection that is no
    /// longer live.
    pub fn observe(&mut self, event: &LinkEvent) -> bool {
        if self.current() != Some(event.connection()) {
            return false;
        }
        match event {
            LinkEvent::Opened(_) => {
                if let Some(live) = self.live.as_mut() {
                    live.state = ConnectionState::Connected;
                }
            }
            LinkEvent::Frame(..) => {}
            LinkEvent::Closed { .. } | LinkEvent::Failed { .. } => self.live = None,
        }
        true
    }

    pub fn state(&self) -> ConnectionState {
        self.live
            .as_ref()
            .map_or(ConnectionState::Disconnected, |l| l.state)
    }

    /// Id of the live connection, if any.
    pub fn current(&self) -> Option<ConnectionId> {
        self.live.as_ref().map(|l| l.id)
    }
}

fn close_message(reason: String) -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::from(NORMAL_CLOSURE),
        reason: reason.into(),
    }))
}

/// Decode a binary frame the way a browser turns a Blob into text.
fn frame_text(data: &[u8]) -> Result<String, SyncError> {
    std::str::from_utf8(data)
        .map(str::to_owned)
        .map_err(|_| SyncError::InvalidEncoding)
}

/// Wait until the manager lets go of a connection that has not opened yet.
async fn abandoned(outgoing: &mut mpsc::UnboundedReceiver<Outgoing>) {
    // Submit refuses to send before the connection opens, so only a close
    // can arrive here.
    while let Some(Outgoing::Text(_)) = outgoing.recv().await {}
}

async fn run_connection(
    id: ConnectionId,
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::Sender<LinkEvent>,
) {
    let ws_stream = tokio::select! {
        result = tokio_tungstenite::connect_async(url.as_str()) => match result {
            Ok((stream, _)) => stream,
            Err(e) => {
                log::warn!("Connection {id} to {url} failed: {e}");
                let error = SyncError::Connect(e.to_string());
                let _ = events.send(LinkEvent::Failed { id, error }).await;
                return;
            }
        },
        _ = abandoned(&mut outgoing) => {
            log::debug!("Connection {id} abandoned before opening");
            return;
        }
    };

    let (mut writer, mut reader) = ws_stream.split();
    if events.send(LinkEvent::Opened(id)).await.is_err() {
        return;
    }
    log::info!("Connection {id} open");

    let reason = loop {
        tokio::select! {
            out = outgoing.recv() => match out {
                Some(Outgoing::Text(text)) => {
                    if let Err(e) = writer.send(Message::Text(text.into())).await {
                        break Some(e.to_string());
                    }
                }
                Some(Outgoing::Close(reason)) => {
                    if let Err(e) = writer.send(close_message(reason)).await {
                        log::debug!("Close handshake on connection {id} failed: {e}");
                    }
                    return;
                }
                None => {
                    let _ = writer.send(close_message(REASON_SHUTDOWN.to_string())).await;
                    return;
                }
            },
            msg = reader.next() => match msg {
                Some(Ok(Message::Binary(data))) => match frame_text(&data) {
                    Ok(text) => {
                        if events.send(LinkEvent::Frame(id, text)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => log::warn!("Dropping frame on connection {id}: {e}"),
                },
                Some(Ok(Message::Text(text))) => {
                    if events.send(LinkEvent::Frame(id, text.as_str().to_owned())).await.is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|f| f.reason.as_str().to_owned());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(e.to_string()),
                None => break None,
            }
        }
    };

    // Flushes the close reply tungstenite queued when the server sent Close.
    if let Err(e) = writer.close().await {
        log::debug!("Closing connection {id} failed: {e}");
    }
    log::info!("Connection {id} closed by server: {}", reason.as_deref().unwrap_or("no reason"));
    let _ = events.send(LinkEvent::Closed { id, reason }).await;
}
