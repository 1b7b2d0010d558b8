//! The EditSet: local edits waiting to be submitted.
//!
//! [`Overlay`] owns both the edit map and the overlay surface, and every
//! mutation writes to both in the same call. A cell is a key of the edit map
//! exactly when the surface shows it as filled-pending.

use std::collections::HashMap;

use crate::grid::{Coord, GridSize, OverlaySurface, Species};

pub struct Overlay<S: OverlaySurface> {
    size: GridSize,
    edits: HashMap<Coord, Species>,
    surface: S,
}

impl<S: OverlaySurface> Overlay<S> {
    pub fn new(size: GridSize, surface: S) -> Self {
        Self {
            size,
            edits: HashMap::new(),
            surface,
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    /// Mark `coord` filled-pending with `species`. Out-of-grid cells are
    /// ignored.
    pub fn fill(&mut self, coord: Coord, species: &Species) {
        if !self.size.contains(coord) {
            return;
        }
        self.surface.set_pending(coord, Some(species));
        self.edits.insert(coord, species.clone());
    }

    /// Clear any pending edit on `coord`.
    pub fn empty(&mut self, coord: Coord) {
        if self.edits.remove(&coord).is_some() {
            self.surface.set_pending(coord, None);
        }
    }

    /// Fill an empty cell or empty a filled one.
    pub fn toggle(&mut self, coord: Coord, species: &Species) {
        if self.is_filled(coord) {
            self.empty(coord);
        } else {
            self.fill(coord, species);
        }
    }

    pub fn is_filled(&self, coord: Coord) -> bool {
        self.edits.contains_key(&coord)
    }

    pub fn species_at(&self, coord: Coord) -> Option<&Species> {
        self.edits.get(&coord)
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Remove every edit, handing each one to `f` after its visual state is
    /// cleared.
    pub(crate) fn drain_with(&mut self, mut f: impl FnMut(Coord, Species)) {
        for (coord, species) in self.edits.drain() {
            self.surface.set_pending(coord, None);
            f(coord, species);
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
