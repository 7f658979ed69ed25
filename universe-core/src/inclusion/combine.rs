//! Pointwise conjunction of universe frames.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use crate::error::{Result, UniverseError};
use crate::frame::UniverseFrame;

/// Three-valued AND: false dominates, otherwise unknown dominates.
pub fn and3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// AND any number of frames together.
///
/// The result spans the union of all timestamps and instruments, with
/// columns sorted by name so argument order never matters. A cell that some
/// input frame does not cover counts as false in that frame. An empty input
/// is `OutOfRange`.
pub fn combine_validity<'a, I>(frames: I) -> Result<UniverseFrame>
where
    I: IntoIterator<Item = &'a UniverseFrame>,
{
    let frames: Vec<&UniverseFrame> = frames.into_iter().collect();
    if frames.is_empty() {
        return Err(UniverseError::out_of_range(
            "frames",
            "at least one frame is required",
        ));
    }

    let index: Vec<NaiveDateTime> = frames
        .iter()
        .flat_map(|f| f.index().iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let columns: Vec<String> = frames
        .iter()
        .flat_map(|f| f.columns().iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    // Per frame: row position of every output timestamp.
    let rows: Vec<Vec<Option<usize>>> = frames
        .iter()
        .map(|f| index.iter().map(|ts| f.row_position(*ts)).collect())
        .collect();

    let data = columns
        .iter()
        .map(|column| {
            let positions: Vec<Option<usize>> =
                frames.iter().map(|f| f.column_position(column)).collect();
            (0..index.len())
                .map(|i| {
                    frames
                        .iter()
                        .zip(&positions)
                        .zip(&rows)
                        .fold(Some(true), |acc, ((frame, col), rows)| {
                            let cell = match (rows[i], *col) {
                                (Some(row), Some(col)) => frame.get(row, col).copied(),
                                _ => Some(false),
                            };
                            and3(acc, cell)
                        })
                })
                .collect()
        })
        .collect();

    UniverseFrame::from_columns(index, columns, data)
}
