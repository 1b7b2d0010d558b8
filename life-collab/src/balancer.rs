//! Periodic overflow supervision.
//!
//! When the buffer is overflowing at a sweep, the backlog can no longer be
//! consumed in time. The owner then cycles the connection: the old buffer is
//! discarded and the new connection's first frame is a fresh snapshot.
//!
//! ```text
//!              start()                 first diff enqueued
//!  Inactive ───────────► Active-Idle ─────────────────────► Active-Draining
//!     ▲                      ▲                                    │
//!     │ stop()               └──── sentinel dequeued, buffer empty┘
//!     └─────────────── (from any state)
//! ```

use crate::processor::DiffProcessor;

/// Joint state of the balancer and the processor it supervises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Inactive,
    ActiveIdle,
    ActiveDraining,
}

#[derive(Debug, Default)]
pub struct Balancer {
    active: bool,
    sweeps: u64,
    resyncs: u64,
}

impl Balancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the sweep schedule.
    pub fn start(&mut self) {
        self.active = true;
    }

    /// Disarm the sweep schedule and stop the processor's dequeue timer.
    pub fn stop(&mut self, processor: &mut DiffProcessor) {
        self.active = false;
        processor.stop_dequeueing();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// One sweep. Returns `true` when the connection must be cycled.
    pub fn balance(&mut self, processor: &DiffProcessor) -> bool {
        if !self.active {
            return false;
        }
        self.sweeps += 1;
        if processor.is_overflowing() {
            self.resyncs += 1;
            return true;
        }
        false
    }

    pub fn phase(&self, processor: &DiffProcessor) -> Phase {
        match (self.active, processor.is_dequeueing()) {
            (false, _) => Phase::Inactive,
            (true, false) => Phase::ActiveIdle,
            (true, true) => Phase::ActiveDraining,
        }
    }

    /// Number of sweeps performed.
    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    /// Number of sweeps that found the buffer overflowing.
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }
}
