//! Scripted WebSocket server and polling helpers for the integration tests.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use life_collab::{ClientConfig, SessionEvent};
use life_core::GridSize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at, Duration, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

pub const GRID: GridSize = GridSize::new(8, 8);

/// Script entry that makes the server start the close handshake.
pub const SERVER_CLOSE: &str = "<close>";

/// Upper bound for anything the tests wait on.
pub const WAIT: Duration = Duration::from_secs(5);

/// What the scripted server observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Handshake completed on the n-th accepted connection.
    Accepted(usize),
    /// A text frame from the client.
    Received(usize, String),
    Closed {
        connection: usize,
        code: Option<u16>,
        reason: Option<String>,
    },
}

/// A server that plays a fixed script to each connection.
///
/// Connection `n` is sent `scripts[n]` (or the last script once they run
/// out) right after the handshake. Every frame the client sends afterwards is
/// echoed back as a one-diff burst.
pub struct TestServer {
    pub port: u16,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    seen: Vec<ServerEvent>,
}

impl TestServer {
    pub async fn start(scripts: Vec<Vec<String>>) -> Self {
        assert!(!scripts.is_empty());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut accepted = 0;
            while let Ok((stream, _)) = listener.accept().await {
                let script = scripts[accepted.min(scripts.len() - 1)].clone();
                tokio::spawn(serve(stream, accepted, script, tx.clone()));
                accepted += 1;
            }
        });

        Self {
            port,
            events: rx,
            seen: Vec::new(),
        }
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            server_url: self.url(),
            grid: GRID,
            ..ClientConfig::default()
        }
    }

    /// Wait for a matching event. Events that do not match are kept for
    /// later calls, so the order of waits does not have to follow the order
    /// of arrival.
    pub async fn wait_for(&mut self, pred: impl Fn(&ServerEvent) -> bool) -> ServerEvent {
        if let Some(pos) = self.seen.iter().position(|e| pred(e)) {
            return self.seen.remove(pos);
        }
        let deadline = Instant::now() + WAIT;
        loop {
            let event = timeout_at(deadline, self.events.recv())
                .await
                .expect("timed out waiting for server event")
                .expect("server stopped");
            if pred(&event) {
                return event;
            }
            self.seen.push(event);
        }
    }

    /// `true` if nothing matching arrives within `window`.
    pub async fn quiet_for(
        &mut self,
        window: Duration,
        pred: impl Fn(&ServerEvent) -> bool,
    ) -> bool {
        if self.seen.iter().any(|e| pred(e)) {
            return false;
        }
        let deadline = Instant::now() + window;
        while let Ok(Some(event)) = timeout_at(deadline, self.events.recv()).await {
            if pred(&event) {
                return false;
            }
            self.seen.push(event);
        }
        true
    }
}

async fn serve(
    stream: TcpStream,
    index: usize,
    script: Vec<String>,
    tx: mpsc::UnboundedSender<ServerEvent>,
) {
    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let _ = tx.send(ServerEvent::Accepted(index));

    // Scripted frames go out as binary, the way a browser server sends blobs.
    for frame in script {
        let message = if frame == SERVER_CLOSE {
            Message::Close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "server restart".into(),
            }))
        } else {
            Message::Binary(frame.into_bytes().into())
        };
        if ws.send(message).await.is_err() {
            return;
        }
    }

    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let text = text.as_str().to_owned();
                let _ = tx.send(ServerEvent::Received(index, text.clone()));
                if ws.send(Message::Text(text.into())).await.is_err()
                    || ws.send(Message::Text("{}".into())).await.is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(frame)) => {
                let _ = tx.send(ServerEvent::Closed {
                    connection: index,
                    code: frame.as_ref().map(|f| u16::from(f.code)),
                    reason: frame.map(|f| f.reason.as_str().to_owned()),
                });
                return;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    let _ = tx.send(ServerEvent::Closed {
        connection: index,
        code: None,
        reason: None,
    });
}

/// Snapshot frame for [`GRID`] with the given cells filled.
pub fn snapshot(filled: &[(u32, u32, &str)]) -> String {
    let mut rows = vec![vec![String::new(); GRID.height as usize]; GRID.width as usize];
    for &(x, y, species) in filled {
        rows[x as usize][y as usize] = species.to_string();
    }
    serde_json::to_string(&rows).unwrap()
}

/// Wait for a matching session event, discarding the ones before it.
pub async fn wait_for_event(
    events: &mut mpsc::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    let deadline = Instant::now() + WAIT;
    loop {
        let event = timeout_at(deadline, events.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("session stopped");
        if pred(&event) {
            return event;
        }
    }
}

/// Poll `check` until it holds.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(WAIT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
