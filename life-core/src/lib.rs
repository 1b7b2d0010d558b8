//! # life-core: Shared grid model for multiplayer Life
//!
//! Everything here is synchronous and free of I/O: the grid and its two
//! surfaces, the local EditSet, the gesture recognizers that fill it, and the
//! wire shapes exchanged with the server.
//!
//! ## Modules
//!
//! - [`grid`]: Coordinates, species, board and overlay surfaces, screen layout
//! - [`edit`]: The EditSet of pending local edits
//! - [`gesture`]: Pointer, touch-drag and tap recognizers
//! - [`diff`]: Diff and snapshot wire types
//! - [`codec`]: Flushing the EditSet into an outbound diff

pub mod codec;
pub mod diff;
pub mod edit;
pub mod gesture;
pub mod grid;

pub use codec::{encode, flush};
pub use diff::{CellValue, Diff, DiffError, Snapshot, END_OF_BURST};
pub use edit::Overlay;
pub use gesture::{
    DrawState, EditSurface, InputEvent, InputResponse, Interaction, PointerRecognizer,
    TapRecognizer, TouchDragRecognizer, TOUCH_SETTLE_WINDOW,
};
pub use grid::{
    Board, BoardSurface, Coord, GridLayout, GridSize, OverlayCells, OverlaySurface, Species,
};
