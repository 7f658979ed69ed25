//! Data availability over a trailing window.

use super::hysteresis::hold_inclusion;
use crate::calendar::Calendar;
use crate::error::{Result, UniverseError};
use crate::frame::{NumericFrame, UniverseFrame};

/// Include an instrument when at least `threshold_pct` of the last
/// `rolling_window` rows of `values` (current row included) hold a value.
///
/// Windows are counted in rows of `values`, not calendar steps; at the start
/// of the data the window is simply shorter. The result is placed on the
/// calendar, held for `tolerance_timeframes` steps, and undecided cells
/// become false.
///
/// `threshold_pct` is not limited to `[0, 1]`: above one nothing qualifies,
/// at or below zero every row does.
pub fn rolling_validity(
    values: &NumericFrame,
    threshold_pct: f64,
    rolling_window: usize,
    tolerance_timeframes: usize,
    calendar: &Calendar,
) -> Result<UniverseFrame> {
    if rolling_window == 0 {
        return Err(UniverseError::out_of_range(
            "rolling_window",
            "must be at least 1",
        ));
    }
    let required = threshold_pct * rolling_window as f64;

    let raw: UniverseFrame = values.map_columns(|col| {
        let mut count = 0usize;
        col.iter()
            .enumerate()
            .map(|(i, cell)| {
                count += usize::from(cell.is_some());
                if i >= rolling_window && col[i - rolling_window].is_some() {
                    count -= 1;
                }
                Some(count as f64 >= required)
            })
            .collect()
    });

    Ok(raw
        .reindex(&calendar.timestamps())
        .map_columns(|col| hold_inclusion(col, tolerance_timeframes))
        .fill_unknown(false))
}
