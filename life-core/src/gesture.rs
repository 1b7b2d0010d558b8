//! Gesture recognizers that turn pointer and touch input into overlay edits.
//!
//! ```text
//!            InputEvent
//!                │
//!                ▼
//!        ┌───────────────┐   shared interaction token
//!        │  EditSurface  │──────────────────────────┐
//!        └───────┬───────┘                          │
//!      ┌─────────┼──────────────┐                   │
//!      ▼         ▼              ▼                   │
//!  Pointer   TouchDrag         Tap   ◄──────────────┘
//!      │         │              │
//!      └─────────┴──────┬───────┘
//!                       ▼
//!                 Overlay (EditSet)
//! ```
//!
//! Pointer and touch input never act on the same interaction. A touch claims
//! the token on start and keeps pointer input out until a short settle window
//! after it ends, which covers the mouse events some browsers synthesize after
//! a tap.

use std::time::{Duration, Instant};

use crate::edit::Overlay;
use crate::grid::{Coord, GridLayout, OverlaySurface, Species};

/// How long pointer input stays refused after a touch interaction ends.
pub const TOUCH_SETTLE_WINDOW: Duration = Duration::from_millis(800);

/// What a drag does to the cells it visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawState {
    #[default]
    Idle,
    Drawing,
    Erasing,
}

impl DrawState {
    /// The mode a gesture starting on `coord` would take.
    fn starting_on<S: OverlaySurface>(overlay: &Overlay<S>, coord: Coord) -> Self {
        if overlay.is_filled(coord) {
            DrawState::Erasing
        } else {
            DrawState::Drawing
        }
    }

    /// Apply the mode to a visited cell. Drawing only fills empty cells and
    /// erasing only clears filled ones, so re-entering a cell is a no-op.
    fn visit<S: OverlaySurface>(self, overlay: &mut Overlay<S>, coord: Coord, species: &Species) -> bool {
        match self {
            DrawState::Drawing if !overlay.is_filled(coord) => {
                overlay.fill(coord, species);
                true
            }
            DrawState::Erasing if overlay.is_filled(coord) => {
                overlay.empty(coord);
                true
            }
            _ => false,
        }
    }
}

/// Click-and-drag with a mouse or pen.
#[derive(Debug, Default)]
pub struct PointerRecognizer {
    state: DrawState,
}

impl PointerRecognizer {
    pub fn state(&self) -> DrawState {
        self.state
    }

    /// Returns `false` when `coord` is off the grid and nothing changed.
    pub fn press<S: OverlaySurface>(&mut self, overlay: &mut Overlay<S>, coord: Coord, species: &Species) -> bool {
        self.state = DrawState::starting_on(overlay, coord);
        if !overlay.size().contains(coord) {
            return false;
        }
        match self.state {
            DrawState::Erasing => overlay.empty(coord),
            _ => overlay.fill(coord, species),
        }
        true
    }

    pub fn enter<S: OverlaySurface>(&mut self, overlay: &mut Overlay<S>, coord: Coord, species: &Species) -> bool {
        self.state.visit(overlay, coord, species)
    }

    pub fn release(&mut self) {
        self.state = DrawState::Idle;
    }
}

/// Drag with exactly one finger.
///
/// Touch start only records the mode. Marks are made on move, so a second
/// finger arriving for a pan or pinch never leaves a stray cell behind.
#[derive(Debug, Default)]
pub struct TouchDragRecognizer {
    state: DrawState,
}

impl TouchDragRecognizer {
    pub fn state(&self) -> DrawState {
        self.state
    }

    pub fn start<S: OverlaySurface>(&mut self, overlay: &Overlay<S>, touches: usize, target: Option<Coord>) {
        if touches != 1 {
            return;
        }
        if let Some(coord) = target {
            self.state = DrawState::starting_on(overlay, coord);
        }
    }

    /// `under` is the cell beneath the touch point now, not where it began.
    pub fn moved<S: OverlaySurface>(
        &mut self,
        overlay: &mut Overlay<S>,
        touches: usize,
        under: Option<Coord>,
        species: &Species,
    ) -> bool {
        if touches != 1 {
            return false;
        }
        match under {
            Some(coord) => self.state.visit(overlay, coord, species),
            None => false,
        }
    }

    pub fn end(&mut self) {
        self.state = DrawState::Idle;
    }
}

/// Single-finger tap that toggles one cell immediately on release.
#[derive(Debug, Default)]
pub struct TapRecognizer {
    tapping: bool,
}

impl TapRecognizer {
    pub fn is_tapping(&self) -> bool {
        self.tapping
    }

    pub fn start(&mut self, touches: usize) {
        self.tapping = touches == 1;
    }

    pub fn moved(&mut self) {
        self.tapping = false;
    }

    /// Returns `true` when the release completed a clean tap and the target
    /// was toggled.
    pub fn end<S: OverlaySurface>(
        &mut self,
        overlay: &mut Overlay<S>,
        remaining: usize,
        target: Option<Coord>,
        species: &Species,
    ) -> bool {
        let was_tapping = std::mem::take(&mut self.tapping);
        if remaining != 0 || !was_tapping {
            return false;
        }
        match target {
            Some(coord) => {
                overlay.toggle(coord, species);
                true
            }
            None => false,
        }
    }

    pub fn cancel(&mut self) {
        self.tapping = false;
    }
}

/// Raw input as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { cell: Coord },
    /// The pointer moved into a new cell.
    PointerEnter { cell: Coord },
    /// Released anywhere, on or off the grid.
    PointerUp,
    TouchStart { touches: usize, target: Option<Coord> },
    /// Screen position of the first active touch.
    TouchMove { touches: usize, x: f32, y: f32 },
    /// `remaining` is the number of touches still down after the release.
    TouchEnd { remaining: usize, target: Option<Coord> },
    TouchCancel,
}

/// What the surface did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputResponse {
    /// At least one overlay cell changed.
    pub edited: bool,
    /// The host should suppress the platform's default handling (scrolling,
    /// synthesized mouse events).
    pub prevent_default: bool,
}

/// Which input modality currently owns the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interaction {
    #[default]
    None,
    Pointer,
    Touch,
    /// A touch interaction ended at this instant; pointer input stays refused
    /// until the settle window passes.
    TouchSettling(Instant),
}

/// The three recognizers working on one overlay.
#[derive(Debug)]
pub struct EditSurface {
    pointer: PointerRecognizer,
    drag: TouchDragRecognizer,
    tap: TapRecognizer,
    interaction: Interaction,
    species: Species,
    layout: GridLayout,
    settle_window: Duration,
    enabled: bool,
}

impl EditSurface {
    pub fn new(species: Species, layout: GridLayout) -> Self {
        Self {
            pointer: PointerRecognizer::default(),
            drag: TouchDragRecognizer::default(),
            tap: TapRecognizer::default(),
            interaction: Interaction::None,
            species,
            layout,
            settle_window: TOUCH_SETTLE_WINDOW,
            enabled: true,
        }
    }

    pub fn with_settle_window(mut self, window: Duration) -> Self {
        self.settle_window = window;
        self
    }

    pub fn species(&self) -> &Species {
        &self.species
    }

    pub fn set_species(&mut self, species: Species) {
        self.species = species;
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: GridLayout) {
        self.layout = layout;
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    pub fn pointer_state(&self) -> DrawState {
        self.pointer.state()
    }

    pub fn drag_state(&self) -> DrawState {
        self.drag.state()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Switch between draw mode and pan mode. Leaving draw mode abandons any
    /// gesture in progress.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.pointer.release();
        self.drag.end();
        self.tap.cancel();
        self.interaction = Interaction::None;
    }

    fn pointer_allowed(&mut self, now: Instant) -> bool {
        match self.interaction {
            Interaction::None | Interaction::Pointer => true,
            Interaction::Touch => false,
            Interaction::TouchSettling(since) => {
                if now.saturating_duration_since(since) >= self.settle_window {
                    self.interaction = Interaction::None;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Feed one event through the recognizers.
    pub fn handle<S: OverlaySurface>(
        &mut self,
        overlay: &mut Overlay<S>,
        event: InputEvent,
        now: Instant,
    ) -> InputResponse {
        if !self.enabled {
            return InputResponse::default();
        }
        let mut response = InputResponse::default();
        match event {
            InputEvent::PointerDown { cell } => {
                if !self.pointer_allowed(now) {
                    log::trace!("Pointer down at {cell} refused during touch interaction");
                    return response;
                }
                self.interaction = Interaction::Pointer;
                response.edited = self.pointer.press(overlay, cell, &self.species);
            }
            InputEvent::PointerEnter { cell } => {
                if self.interaction == Interaction::Pointer {
                    response.edited = self.pointer.enter(overlay, cell, &self.species);
                }
            }
            InputEvent::PointerUp => {
                if self.interaction == Interaction::Pointer {
                    self.interaction = Interaction::None;
                }
                self.pointer.release();
            }
            InputEvent::TouchStart { touches, target } => {
                self.pointer.release();
                self.interaction = Interaction::Touch;
                self.drag.start(overlay, touches, target);
                self.tap.start(touches);
            }
            InputEvent::TouchMove { touches, x, y } => {
                self.tap.moved();
                let under = self.layout.cell_at(x, y);
                response.edited = self.drag.moved(overlay, touches, under, &self.species);
                response.prevent_default = touches == 1;
            }
            InputEvent::TouchEnd { remaining, target } => {
                self.drag.end();
                if self.tap.end(overlay, remaining, target, &self.species) {
                    response.edited = true;
                    response.prevent_default = true;
                }
                if remaining == 0 {
                    self.interaction = Interaction::TouchSettling(now);
                }
            }
            InputEvent::TouchCancel => {
                self.drag.end();
                self.tap.cancel();
                self.interaction = Interaction::TouchSettling(now);
            }
        }
        response
    }
}
