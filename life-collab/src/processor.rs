//! Two-speed pipeline for inbound board changes.
//!
//! ```text
//!  frames (any rate)            fixed cadence (170 ms)
//!        │                              │
//!        ▼                              ▼
//!   enqueue() ──► [ diff | diff | … ] ──► tick() ──► board
//!        │
//!        └── snapshot ──────────────────────────────► board (immediately)
//! ```
//!
//! The processor is a plain state machine. `is_dequeueing()` tells the owner
//! whether the dequeue timer should exist; the owner creates it when the flag
//! rises and drops it when the flag falls.

use std::collections::VecDeque;

use life_core::{BoardSurface, Diff, GridSize, Snapshot, END_OF_BURST};

use crate::protocol::{FrameKind, SyncError};

/// Result of handing one frame to the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// A snapshot was written straight to the board.
    Snapshot { cells: usize },
    /// A diff joined the buffer. `started` is set when this diff started the
    /// dequeue timer.
    Buffered { started: bool },
}

/// Result of one dequeue tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing buffered.
    Idle,
    /// The end-of-burst sentinel drained the buffer; dequeueing stopped.
    BurstEnded,
    /// A diff was applied to the board.
    Applied { cells: usize },
}

/// FIFO diff buffer with overflow detection.
#[derive(Debug)]
pub struct DiffProcessor {
    grid: GridSize,
    buffer: VecDeque<String>,
    overflow_threshold: usize,
    dequeueing: bool,
}

impl DiffProcessor {
    pub fn new(grid: GridSize, overflow_threshold: usize) -> Self {
        Self {
            grid,
            buffer: VecDeque::new(),
            overflow_threshold,
            dequeueing: false,
        }
    }

    /// Accept one decoded frame.
    ///
    /// Snapshots bypass the buffer. Diffs are buffered unparsed and start the
    /// dequeue timer if it is not running.
    pub fn enqueue(
        &mut self,
        payload: String,
        board: &mut impl BoardSurface,
    ) -> Result<Enqueued, SyncError> {
        match FrameKind::classify(&payload) {
            FrameKind::Snapshot => {
                let snapshot = Snapshot::parse(&payload)?;
                let cells = snapshot.apply(self.grid, board)?;
                Ok(Enqueued::Snapshot { cells })
            }
            FrameKind::Diff => {
                self.buffer.push_back(payload);
                let started = !self.dequeueing;
                self.dequeueing = true;
                Ok(Enqueued::Buffered { started })
            }
        }
    }

    /// Apply the oldest buffered diff.
    ///
    /// An error means the popped frame was malformed and has been dropped;
    /// the buffer itself is still consistent.
    pub fn tick(&mut self, board: &mut impl BoardSurface) -> Result<Tick, SyncError> {
        let Some(payload) = self.buffer.pop_front() else {
            return Ok(Tick::Idle);
        };
        if payload == END_OF_BURST && self.buffer.is_empty() {
            self.dequeueing = false;
            return Ok(Tick::BurstEnded);
        }
        let diff = Diff::parse(&payload)?;
        diff.validate(self.grid)?;
        let cells = diff.apply(board);
        Ok(Tick::Applied { cells })
    }

    /// Discard every buffered diff.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Stop the dequeue timer. Safe to call when it is already stopped.
    pub fn stop_dequeueing(&mut self) {
        self.dequeueing = false;
    }

    /// Whether the buffer holds more diffs than the threshold allows.
    ///
    /// Derived from the buffer length on every call, so it is current after
    /// every enqueue, tick and clear.
    pub fn is_overflowing(&self) -> bool {
        self.buffer.len() > self.overflow_threshold
    }

    /// Whether the dequeue timer should be running.
    pub fn is_dequeueing(&self) -> bool {
        self.dequeueing
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
