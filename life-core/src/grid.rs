//! Grid geometry, species, and the two cell surfaces.
//!
//! Every cell exists twice:
//!
//! ```text
//! ┌──────────────┐   server-confirmed   ┌──────────────┐
//! │ Board        │ ◄─────────────────── │ Snapshot/Diff│
//! │ (authority)  │                      └──────────────┘
//! └──────────────┘
//! ┌──────────────┐   local gestures     ┌──────────────┐
//! │ Overlay      │ ◄─────────────────── │ EditSurface  │
//! │ (pending)    │                      └──────────────┘
//! └──────────────┘
//! ```
//!
//! The core never renders anything itself. It talks to the host through
//! [`BoardSurface`] and [`OverlaySurface`], which only know how to set the
//! visual state of a single cell.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diff::DiffError;

/// Integer cell coordinates. `x` is the row, `y` the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}

impl Coord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Fixed dimensions of the shared grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether `coord` lies inside the grid.
    pub fn contains(&self, coord: Coord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    /// Row-major index of `coord`, or `None` when it is outside the grid.
    pub fn index(&self, coord: Coord) -> Option<usize> {
        if !self.contains(coord) {
            return None;
        }
        Some(coord.x as usize * self.height as usize + coord.y as usize)
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::new(120, 120)
    }
}

/// Colour identity filling a cell, always stored as `#` + six lowercase hex
/// digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Species(String);

impl Species {
    /// Parse a colour code. Accepts six hex digits with an optional leading
    /// `#`, in either case.
    pub fn parse(raw: &str) -> Result<Self, DiffError> {
        let digits = raw.strip_prefix('#').unwrap_or(raw);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DiffError::InvalidSpecies(raw.to_string()));
        }
        Ok(Self(format!("#{}", digits.to_ascii_lowercase())))
    }

    /// A random colour, seeded from a v4 UUID.
    pub fn random() -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        Self(format!("#{:02x}{:02x}{:02x}", bytes[0], bytes[1], bytes[2]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Species {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Species::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// The authoritative board as seen by the host.
pub trait BoardSurface {
    /// Show `coord` as filled with `species`, or as empty when `None`.
    fn set_cell(&mut self, coord: Coord, species: Option<&Species>);
}

/// The local overlay of pending edits as seen by the host.
pub trait OverlaySurface {
    /// Show `coord` as filled-pending with `species`, or clear it.
    fn set_pending(&mut self, coord: Coord, species: Option<&Species>);
}

impl<T: BoardSurface + ?Sized> BoardSurface for Arc<Mutex<T>> {
    fn set_cell(&mut self, coord: Coord, species: Option<&Species>) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_cell(coord, species);
    }
}

impl<T: OverlaySurface + ?Sized> OverlaySurface for Arc<Mutex<T>> {
    fn set_pending(&mut self, coord: Coord, species: Option<&Species>) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_pending(coord, species);
    }
}

/// In-memory authoritative board.
#[derive(Debug, Clone)]
pub struct Board {
    size: GridSize,
    cells: Vec<Option<Species>>,
}

impl Board {
    pub fn new(size: GridSize) -> Self {
        Self {
            size,
            cells: vec![None; size.cell_count()],
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    /// Species filling `coord`, if any.
    pub fn get(&self, coord: Coord) -> Option<&Species> {
        self.size
            .index(coord)
            .and_then(|i| self.cells[i].as_ref())
    }

    pub fn is_filled(&self, coord: Coord) -> bool {
        self.get(coord).is_some()
    }

    /// Number of filled cells.
    pub fn population(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Empty every cell.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = None);
    }
}

impl BoardSurface for Board {
    fn set_cell(&mut self, coord: Coord, species: Option<&Species>) {
        if let Some(i) = self.size.index(coord) {
            self.cells[i] = species.cloned();
        }
    }
}

/// In-memory mirror of the overlay's visual state.
#[derive(Debug, Clone, Default)]
pub struct OverlayCells {
    pending: HashMap<Coord, Species>,
}

impl OverlayCells {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, coord: Coord) -> bool {
        self.pending.contains_key(&coord)
    }

    pub fn species_at(&self, coord: Coord) -> Option<&Species> {
        self.pending.get(&coord)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl OverlaySurface for OverlayCells {
    fn set_pending(&mut self, coord: Coord, species: Option<&Species>) {
        match species {
            Some(s) => {
                self.pending.insert(coord, s.clone());
            }
            None => {
                self.pending.remove(&coord);
            }
        }
    }
}

/// Maps screen points onto grid cells.
///
/// Tracks pan and zoom the same way a viewport camera does: a screen point is
/// divided by the zoom, offset by the pan, then divided by the cell size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub size: GridSize,
    /// Edge length of one cell in unzoomed pixels.
    pub cell_size: f32,
    pub pan_x: f32,
    pub pan_y: f32,
    pub zoom: f32,
}

impl GridLayout {
    pub fn new(size: GridSize, cell_size: f32) -> Self {
        Self {
            size,
            cell_size,
            pan_x: 0.0,
            pan_y: 0.0,
            zoom: 1.0,
        }
    }

    /// Cell under the screen point, or `None` when the point is off the grid.
    ///
    /// Rows run down the screen, so `x` comes from the vertical axis.
    pub fn cell_at(&self, screen_x: f32, screen_y: f32) -> Option<Coord> {
        if self.cell_size <= 0.0 || self.zoom <= 0.0 {
            return None;
        }
        let world_x = screen_x / self.zoom + self.pan_x;
        let world_y = screen_y / self.zoom + self.pan_y;
        if !world_x.is_finite() || !world_y.is_finite() {
            return None;
        }
        if world_x < 0.0 || world_y < 0.0 {
            return None;
        }
        let row = (world_y / self.cell_size).floor();
        let col = (world_x / self.cell_size).floor();
        if row >= self.size.width as f32 || col >= self.size.height as f32 {
            return None;
        }
        Some(Coord::new(row as u32, col as u32))
    }

    /// Pan by a screen-space delta.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pan_x -= dx / self.zoom;
        self.pan_y -= dy / self.zoom;
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::new(GridSize::default(), 8.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_species_normalises() {
        assert_eq!(Species::parse("#FF0000").unwrap().as_str(), "#ff0000");
        assert_eq!(Species::parse("12abEF").unwrap().as_str(), "#12abef");
    }

    #[test]
    fn test_species_rejects_bad_codes() {
        assert!(Species::parse("").is_err());
        assert!(Species::parse("#fff").is_err());
        assert!(Species::parse("#gg0000").is_err());
        assert!(Species::parse("##ff0000").is_err());
        assert!(Species::parse("#ff00001").is_err());
    }

    #[test]
    fn test_species_random_is_valid() {
        for _ in 0..32 {
            let s = Species::random();
            assert_eq!(Species::parse(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn test_grid_index_bounds() {
        let size = GridSize::new(3, 4);
        assert_eq!(size.index(Coord::new(0, 0)), Some(0));
        assert_eq!(size.index(Coord::new(2, 3)), Some(11));
        assert_eq!(size.index(Coord::new(3, 0)), None);
        assert_eq!(size.index(Coord::new(0, 4)), None);
        assert_eq!(size.cell_count(), 12);
    }

    #[test]
    fn test_board_set_and_clear() {
        let mut board = Board::new(GridSize::new(4, 4));
        let red = Species::parse("#ff0000").unwrap();

        board.set_cell(Coord::new(1, 2), Some(&red));
        assert_eq!(board.get(Coord::new(1, 2)), Some(&red));
        assert_eq!(board.population(), 1);

        // Out of range writes are ignored.
        board.set_cell(Coord::new(9, 9), Some(&red));
        assert_eq!(board.population(), 1);

        board.set_cell(Coord::new(1, 2), None);
        assert!(!board.is_filled(Coord::new(1, 2)));

        board.set_cell(Coord::new(0, 0), Some(&red));
        board.clear();
        assert_eq!(board.population(), 0);
    }

    #[test]
    fn test_shared_board_surface() {
        let board = Arc::new(Mutex::new(Board::new(GridSize::new(2, 2))));
        let mut surface = board.clone();
        surface.set_cell(Coord::new(1, 1), Some(&Species::parse("00ff00").unwrap()));
        assert!(board.lock().unwrap().is_filled(Coord::new(1, 1)));
    }

    #[test]
    fn test_layout_cell_at() {
        let layout = GridLayout::new(GridSize::new(10, 10), 10.0);
        assert_eq!(layout.cell_at(5.0, 5.0), Some(Coord::new(0, 0)));
        // Vertical axis selects the row.
        assert_eq!(layout.cell_at(25.0, 95.0), Some(Coord::new(9, 2)));
        assert_eq!(layout.cell_at(-1.0, 5.0), None);
        assert_eq!(layout.cell_at(5.0, 100.0), None);
        assert_eq!(layout.cell_at(f32::NAN, 5.0), None);
        assert_eq!(layout.cell_at(5.0, f32::NAN), None);
        assert_eq!(layout.cell_at(f32::INFINITY, 5.0), None);
        assert_eq!(layout.cell_at(5.0, f32::NEG_INFINITY), None);

        let mut drifted = GridLayout::new(GridSize::new(10, 10), 10.0);
        drifted.pan_x = f32::NAN;
        assert_eq!(drifted.cell_at(5.0, 5.0), None);
    }

    #[test]
    fn test_layout_pan_and_zoom() {
        let mut layout = GridLayout::new(GridSize::new(10, 10), 10.0);
        layout.zoom = 2.0;
        assert_eq!(layout.cell_at(30.0, 30.0), Some(Coord::new(1, 1)));

        layout.pan(-40.0, -40.0);
        assert_eq!(layout.cell_at(30.0, 30.0), Some(Coord::new(3, 3)));
    }
}
