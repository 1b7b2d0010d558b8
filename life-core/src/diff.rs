//! Wire shapes for board changes.
//!
//! ```text
//! Snapshot  [["", "#12ab34", …], …]       x-major full board, first frame
//! Diff      {"3": {"4": "#ff0000"}}       sparse x → y → species
//! Sentinel  {}                            end of a burst of diffs
//! ```
//!
//! A cell value of `""` (or a false-equivalent such as `false`, `null`, `0`)
//! empties the cell.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::grid::{BoardSurface, Coord, GridSize, Species};

/// The literal empty diff, marking the end of a burst.
pub const END_OF_BURST: &str = "{}";

/// Value of a single cell on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Empty,
    Filled(Species),
}

impl CellValue {
    pub fn species(&self) -> Option<&Species> {
        match self {
            CellValue::Empty => None,
            CellValue::Filled(s) => Some(s),
        }
    }
}

impl From<Option<Species>> for CellValue {
    fn from(species: Option<Species>) -> Self {
        species.map_or(CellValue::Empty, CellValue::Filled)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_str(""),
            CellValue::Filled(s) => serializer.serialize_str(s.as_str()),
        }
    }
}

struct CellValueVisitor;

impl<'de> Visitor<'de> for CellValueVisitor {
    type Value = CellValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a hexadecimal colour code or an empty marker")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<CellValue, E> {
        if v.is_empty() {
            return Ok(CellValue::Empty);
        }
        Species::parse(v).map(CellValue::Filled).map_err(E::custom)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<CellValue, E> {
        if v {
            return Err(E::invalid_value(de::Unexpected::Bool(v), &self));
        }
        Ok(CellValue::Empty)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<CellValue, E> {
        if v != 0 {
            return Err(E::invalid_value(de::Unexpected::Unsigned(v), &self));
        }
        Ok(CellValue::Empty)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<CellValue, E> {
        if v != 0 {
            return Err(E::invalid_value(de::Unexpected::Signed(v), &self));
        }
        Ok(CellValue::Empty)
    }

    fn visit_unit<E: de::Error>(self) -> Result<CellValue, E> {
        Ok(CellValue::Empty)
    }

    fn visit_none<E: de::Error>(self) -> Result<CellValue, E> {
        Ok(CellValue::Empty)
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CellValueVisitor)
    }
}

/// Sparse two-level change set: x → (y → value).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diff {
    cells: BTreeMap<u32, BTreeMap<u32, CellValue>>,
}

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a diff frame.
    pub fn parse(json: &str) -> Result<Self, DiffError> {
        serde_json::from_str(json).map_err(|e| DiffError::Json(e.to_string()))
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, DiffError> {
        serde_json::to_string(self).map_err(|e| DiffError::Json(e.to_string()))
    }

    /// Record a value for `coord`, replacing any earlier one.
    pub fn insert(&mut self, coord: Coord, value: CellValue) {
        self.cells.entry(coord.x).or_default().insert(coord.y, value);
    }

    pub fn get(&self, coord: Coord) -> Option<&CellValue> {
        self.cells.get(&coord.x).and_then(|ys| ys.get(&coord.y))
    }

    /// Whether this is the empty diff.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of cells the diff touches.
    pub fn cell_count(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    /// Iterate over every (coordinate, value) pair in x, then y order.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, &CellValue)> {
        self.cells
            .iter()
            .flat_map(|(&x, ys)| ys.iter().map(move |(&y, v)| (Coord::new(x, y), v)))
    }

    /// Check every coordinate against the grid.
    pub fn validate(&self, size: GridSize) -> Result<(), DiffError> {
        for (&x, ys) in &self.cells {
            if ys.is_empty() {
                return Err(DiffError::MissingCoordinate(x));
            }
            for &y in ys.keys() {
                let coord = Coord::new(x, y);
                if !size.contains(coord) {
                    return Err(DiffError::OutOfBounds(coord));
                }
            }
        }
        Ok(())
    }

    /// Write every cell onto the board. Returns the number of cells written.
    pub fn apply(&self, board: &mut impl BoardSurface) -> usize {
        let mut written = 0;
        for (coord, value) in self.iter() {
            board.set_cell(coord, value.species());
            written += 1;
        }
        written
    }
}

/// Full-board encoding sent as the first frame of every connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    rows: Vec<Vec<CellValue>>,
}

impl Snapshot {
    pub fn parse(json: &str) -> Result<Self, DiffError> {
        serde_json::from_str(json).map_err(|e| DiffError::Json(e.to_string()))
    }

    pub fn width(&self) -> usize {
        self.rows.len()
    }

    /// Overwrite the board with this snapshot. Returns the number of cells
    /// written.
    pub fn apply(&self, size: GridSize, board: &mut impl BoardSurface) -> Result<usize, DiffError> {
        if self.rows.len() > size.width as usize {
            return Err(DiffError::SnapshotTooLarge {
                rows: self.rows.len(),
                columns: 0,
            });
        }
        if let Some(row) = self.rows.iter().find(|r| r.len() > size.height as usize) {
            return Err(DiffError::SnapshotTooLarge {
                rows: self.rows.len(),
                columns: row.len(),
            });
        }
        let mut written = 0;
        for (x, row) in self.rows.iter().enumerate() {
            for (y, value) in row.iter().enumerate() {
                board.set_cell(Coord::new(x as u32, y as u32), value.species());
                written += 1;
            }
        }
        Ok(written)
    }
}

/// Errors raised while decoding or validating board changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    InvalidSpecies(String),
    OutOfBounds(Coord),
    MissingCoordinate(u32),
    SnapshotTooLarge { rows: usize, columns: usize },
    Json(String),
}

impl fmt::Display for DiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSpecies(s) => write!(f, "Not a hexadecimal colour code: {s:?}"),
            Self::OutOfBounds(c) => write!(f, "Cell ({c}) is outside the grid"),
            Self::MissingCoordinate(x) => write!(f, "X coordinate {x} has no Y coordinate"),
            Self::SnapshotTooLarge { rows, columns } => {
                write!(f, "Snapshot of {rows}x{columns} exceeds the grid")
            }
            Self::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for DiffError {}
