//! Turns the pending EditSet into the outbound diff.

use crate::diff::{CellValue, Diff, DiffError};
use crate::edit::Overlay;
use crate::grid::OverlaySurface;

/// Move every pending edit into a [`Diff`], clearing the EditSet and the
/// overlay as each entry is consumed.
///
/// Returns the empty diff, and touches nothing, when there are no edits.
pub fn flush<S: OverlaySurface>(overlay: &mut Overlay<S>) -> Diff {
    let mut diff = Diff::new();
    if overlay.is_empty() {
        return diff;
    }
    overlay.drain_with(|coord, species| diff.insert(coord, CellValue::Filled(species)));
    diff
}

/// Encode a diff as the text of one outbound frame.
pub fn encode(diff: &Diff) -> Result<String, DiffError> {
    diff.to_json()
}
