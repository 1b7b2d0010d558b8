//! One client session: the owned context behind every component.
//!
//! ```text
//!  SessionHandle ── Command ──┐
//!                             ▼
//!  connection task ── LinkEvent ──► ┌─────────────────────────┐
//!                                   │ Session task (select!)  │
//!  dequeue ticker (170 ms) ───────► │  EditSurface + Overlay  │ ──► SessionEvent
//!  balance ticker (8 s) ──────────► │  DiffProcessor, Board   │
//!                                   │  Balancer, Connection   │
//!                                   └─────────────────────────┘
//! ```
//!
//! Every handler runs to completion before the next one is polled, so the
//! session needs no locks. Timers are `Interval`s that exist only while the
//! processor or balancer says they should; dropping one cancels it.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use uuid::Uuid;

use life_core::{
    BoardSurface, EditSurface, GridLayout, InputEvent, InputResponse, Overlay, OverlaySurface,
    Species,
};

use crate::balancer::{Balancer, Phase};
use crate::config::ClientConfig;
use crate::connection::{ConnectionId, ConnectionManager, ConnectionState, LinkEvent};
use crate::processor::{DiffProcessor, Enqueued, Tick};
use crate::protocol::{
    SyncError, REASON_BUFFER_OVERFLOW, REASON_PAGE_HIDDEN, REASON_SHUTDOWN,
};

/// Edge length of a cell in the default screen layout.
const DEFAULT_CELL_PX: f32 = 8.0;

const COMMAND_CAPACITY: usize = 64;

/// Page visibility as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Notifications for the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected(ConnectionId),
    Disconnected {
        connection: ConnectionId,
        reason: Option<String>,
    },
    SnapshotApplied { cells: usize },
    DiffApplied { cells: usize },
    BurstEnded,
    /// The buffer overflowed and the connection was cycled.
    Resynced,
    Submitted { cells: usize },
    FrameDropped(String),
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub session_id: Uuid,
    pub buffered: usize,
    pub overflowing: bool,
    pub phase: Phase,
    pub pending_edits: usize,
    pub connection: ConnectionState,
    pub connection_id: Option<ConnectionId>,
    pub sweeps: u64,
    pub resyncs: u64,
    pub hidden: bool,
    pub drawing_enabled: bool,
}

enum Command {
    Input(InputEvent, oneshot::Sender<InputResponse>),
    Submit(oneshot::Sender<Option<usize>>),
    Visibility(Visibility),
    Species(Species),
    DrawingEnabled(bool),
    Layout(GridLayout),
    Stats(oneshot::Sender<SessionStats>),
    Shutdown,
}

/// Cloneable handle for driving a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    async fn send(&self, command: Command) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SyncError::SessionClosed)
    }

    /// Feed one input event to the gesture recognizers.
    pub async fn input(&self, event: InputEvent) -> Result<InputResponse, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Input(event, tx)).await?;
        rx.await.map_err(|_| SyncError::SessionClosed)
    }

    /// Submit the pending edits. Returns the number of cells sent, or `None`
    /// when the submit was skipped.
    pub async fn submit(&self) -> Result<Option<usize>, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Submit(tx)).await?;
        rx.await.map_err(|_| SyncError::SessionClosed)
    }

    pub async fn set_visibility(&self, visibility: Visibility) -> Result<(), SyncError> {
        self.send(Command::Visibility(visibility)).await
    }

    pub async fn set_species(&self, species: Species) -> Result<(), SyncError> {
        self.send(Command::Species(species)).await
    }

    /// Switch between draw mode (`true`) and pan mode (`false`).
    pub async fn set_drawing_enabled(&self, enabled: bool) -> Result<(), SyncError> {
        self.send(Command::DrawingEnabled(enabled)).await
    }

    pub async fn set_layout(&self, layout: GridLayout) -> Result<(), SyncError> {
        self.send(Command::Layout(layout)).await
    }

    pub async fn stats(&self) -> Result<SessionStats, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stats(tx)).await?;
        rx.await.map_err(|_| SyncError::SessionClosed)
    }

    /// Stop the session, closing the connection.
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.send(Command::Shutdown).await
    }
}

pub struct Session<B: BoardSurface, O: OverlaySurface> {
    id: Uuid,
    config: ClientConfig,
    surface: EditSurface,
    overlay: Overlay<O>,
    board: B,
    processor: DiffProcessor,
    balancer: Balancer,
    connection: ConnectionManager,
    hidden: bool,
    dequeue_timer: Option<Interval>,
    balance_timer: Option<Interval>,
    commands: mpsc::Receiver<Command>,
    links: mpsc::Receiver<LinkEvent>,
    events: mpsc::Sender<SessionEvent>,
}

impl<B, O> Session<B, O>
where
    B: BoardSurface + Send + 'static,
    O: OverlaySurface + Send + 'static,
{
    /// Start a session task: arms the balancer and opens the first
    /// connection.
    pub fn spawn(
        config: ClientConfig,
        board: B,
        overlay: O,
    ) -> (SessionHandle, mpsc::Receiver<SessionEvent>, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (link_tx, link_rx) = mpsc::channel(config.inbound_capacity.max(1));
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));

        let session = Session {
            id: Uuid::new_v4(),
            surface: EditSurface::new(
                Species::random(),
                GridLayout::new(config.grid, DEFAULT_CELL_PX),
            ),
            overlay: Overlay::new(config.grid, overlay),
            board,
            processor: DiffProcessor::new(config.grid, config.overflow_threshold),
            balancer: Balancer::new(),
            connection: ConnectionManager::new(config.server_url.clone(), link_tx),
            hidden: false,
            dequeue_timer: None,
            balance_timer: None,
            commands: command_rx,
            links: link_rx,
            events: event_tx,
            config,
        };
        let task = tokio::spawn(session.run());
        (SessionHandle { commands: command_tx }, event_rx, task)
    }
}

impl<B: BoardSurface, O: OverlaySurface> Session<B, O> {
    async fn run(mut self) {
        log::info!("Session {} started against {}", self.id, self.config.server_url);
        self.balancer.start();
        self.connection.connect();
        self.sync_timers();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.links.recv() => self.handle_link(event),
                _ = next_tick(&mut self.dequeue_timer) => self.on_dequeue_tick(),
                _ = next_tick(&mut self.balance_timer) => self.on_balance_tick(),
            }
            self.sync_timers();
        }

        self.balancer.stop(&mut self.processor);
        self.connection.disconnect(REASON_SHUTDOWN, &mut self.processor);
        log::info!("Session {} stopped", self.id);
    }

    /// Create or drop the timers so they match the processor and balancer.
    fn sync_timers(&mut self) {
        match (self.processor.is_dequeueing(), self.dequeue_timer.is_some()) {
            (true, false) => {
                log::debug!("Dequeue timer started");
                self.dequeue_timer = Some(ticker(self.config.dequeue_interval));
            }
            (false, true) => {
                log::debug!("Dequeue timer stopped");
                self.dequeue_timer = None;
            }
            _ => {}
        }
        match (self.balancer.is_active(), self.balance_timer.is_some()) {
            (true, false) => self.balance_timer = Some(ticker(self.config.balance_interval)),
            (false, true) => self.balance_timer = None,
            _ => {}
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Input(event, reply) => {
                let response =
                    self.surface
                        .handle(&mut self.overlay, event, std::time::Instant::now());
                let _ = reply.send(response);
            }
            Command::Submit(reply) => {
                let _ = reply.send(self.submit());
            }
            Command::Visibility(visibility) => self.set_visibility(visibility),
            Command::Species(species) => self.surface.set_species(species),
            Command::DrawingEnabled(enabled) => self.surface.set_enabled(enabled),
            Command::Layout(layout) => self.surface.set_layout(layout),
            Command::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
            Command::Shutdown => {}
        }
    }

    fn submit(&mut self) -> Option<usize> {
        match self.connection.submit(&mut self.overlay) {
            Ok(Some(diff)) => {
                let cells = diff.cell_count();
                self.emit(SessionEvent::Submitted { cells });
                Some(cells)
            }
            Ok(None) => {
                log::trace!("Submit skipped");
                None
            }
            Err(e) => {
                log::warn!("Submit failed: {e}");
                None
            }
        }
    }

    fn set_visibility(&mut self, visibility: Visibility) {
        match visibility {
            Visibility::Hidden => {
                log::info!("Page hidden, releasing connection");
                self.balancer.stop(&mut self.processor);
                self.connection
                    .disconnect(REASON_PAGE_HIDDEN, &mut self.processor);
                self.hidden = true;
            }
            // Some platforms report "visible" without a preceding "hidden".
            Visibility::Visible if self.hidden => {
                log::info!("Page visible again, reconnecting");
                self.balancer.start();
                self.connection.connect();
                self.hidden = false;
            }
            Visibility::Visible => {}
        }
    }

    fn handle_link(&mut self, event: LinkEvent) {
        if !self.connection.observe(&event) {
            log::trace!("Ignoring event from stale connection {}", event.connection());
            return;
        }
        match event {
            LinkEvent::Opened(id) => self.emit(SessionEvent::Connected(id)),
            LinkEvent::Frame(_, payload) => self.enqueue(payload),
            LinkEvent::Closed { id, reason } => {
                self.emit(SessionEvent::Disconnected { connection: id, reason });
            }
            LinkEvent::Failed { id, error } => {
                self.emit(SessionEvent::Disconnected {
                    connection: id,
                    reason: Some(error.to_string()),
                });
            }
        }
    }

    fn enqueue(&mut self, payload: String) {
        match self.processor.enqueue(payload, &mut self.board) {
            Ok(Enqueued::Snapshot { cells }) => {
                log::debug!("Applied snapshot ({cells} cells)");
                self.emit(SessionEvent::SnapshotApplied { cells });
            }
            Ok(Enqueued::Buffered { .. }) => {
                if self.processor.is_overflowing() {
                    log::debug!("Diff buffer overflowing ({} queued)", self.processor.len());
                }
            }
            Err(e) => self.drop_frame(e),
        }
    }

    fn on_dequeue_tick(&mut self) {
        match self.processor.tick(&mut self.board) {
            Ok(Tick::Idle) => {}
            Ok(Tick::BurstEnded) => {
                log::debug!("End of burst");
                self.emit(SessionEvent::BurstEnded);
            }
            Ok(Tick::Applied { cells }) => self.emit(SessionEvent::DiffApplied { cells }),
            Err(e) => self.drop_frame(e),
        }
    }

    fn on_balance_tick(&mut self) {
        if !self.balancer.balance(&self.processor) {
            return;
        }
        log::info!(
            "Diff buffer overflowing with {} queued, resyncing",
            self.processor.len()
        );
        self.connection
            .disconnect(REASON_BUFFER_OVERFLOW, &mut self.processor);
        self.connection.connect();
        self.emit(SessionEvent::Resynced);
    }

    fn drop_frame(&mut self, error: SyncError) {
        log::warn!("Dropping inbound frame: {error}");
        self.emit(SessionEvent::FrameDropped(error.to_string()));
    }

    fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.id,
            buffered: self.processor.len(),
            overflowing: self.processor.is_overflowing(),
            phase: self.balancer.phase(&self.processor),
            pending_edits: self.overlay.len(),
            connection: self.connection.state(),
            connection_id: self.connection.current(),
            sweeps: self.balancer.sweeps(),
            resyncs: self.balancer.resyncs(),
            hidden: self.hidden,
            drawing_enabled: self.surface.is_enabled(),
        }
    }

    /// Best effort: a slow consumer loses events rather than stalling the
    /// session.
    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.events.try_send(event) {
            log::trace!("Session event not delivered: {e}");
        }
    }
}

/// Interval whose first tick is one full period away.
fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
