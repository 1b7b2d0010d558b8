//! # life-collab: WebSocket sync client for multiplayer Life
//!
//! Keeps a local board in step with a shared server board and sends the
//! player's edits back.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     WebSocket      ┌─────────────┐
//! │ Connection  │ ◄─────────────────► │   Server    │
//! │ (per open)  │     JSON text       │ (authority) │
//! └──────┬──────┘                     └─────────────┘
//!        │ LinkEvent
//!        ▼
//! ┌─────────────┐   snapshot   ┌─────────────┐
//! │  Session    │ ───────────► │   Board     │
//! │  (select!)  │              └─────────────┘
//! └──┬───────┬──┘                     ▲
//!    │       │ diffs                  │ 170 ms
//!    │       ▼                        │
//!    │  ┌──────────────┐              │
//!    │  │DiffProcessor │ ─────────────┘
//!    │  └──────┬───────┘
//!    │         │ overflow?
//!    │         ▼
//!    │  ┌──────────────┐
//!    └─►│  Balancer    │  8 s sweep, cycles the connection
//!       └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Frame kinds, close reasons, error type
//! - [`config`]: Timing and capacity settings
//! - [`processor`]: Buffered, rate-limited application of diffs
//! - [`balancer`]: Overflow sweeps that force a resync
//! - [`connection`]: Lifecycle of the live WebSocket
//! - [`session`]: The task that owns everything and the handle to drive it

pub mod balancer;
pub mod config;
pub mod connection;
pub mod processor;
pub mod protocol;
pub mod session;

pub use balancer::{Balancer, Phase};
pub use config::ClientConfig;
pub use connection::{ConnectionId, ConnectionManager, ConnectionState, LinkEvent};
pub use processor::{DiffProcessor, Enqueued, Tick};
pub use protocol::{FrameKind, SyncError};
pub use session::{Session, SessionEvent, SessionHandle, SessionStats, Visibility};
