//! Cross-sectional rank threshold.

use tracing::debug;

use super::check_fraction;
use super::hysteresis::hold_inclusion;
use crate::calendar::Calendar;
use crate::error::Result;
use crate::frame::{NumericFrame, UniverseFrame};

/// Descending competition ranks ("1224"): the largest value ranks 1 and
/// ties share the lowest rank of their group. Missing values get no rank.
pub fn competition_rank(row: &[Option<f64>]) -> Vec<Option<usize>> {
    let mut sorted: Vec<f64> = row.iter().flatten().copied().collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    row.iter()
        .map(|cell| cell.map(|v| 1 + sorted.partition_point(|x| *x > v)))
        .collect()
}

/// Include an instrument when its rank at a timestamp falls within the top
/// `threshold_pct` of the instruments that have a value there.
///
/// The result is placed on the calendar, held for `tolerance_timeframes`
/// steps after each inclusion, and undecided cells become false.
pub fn ranking(
    values: &NumericFrame,
    threshold_pct: f64,
    tolerance_timeframes: usize,
    calendar: &Calendar,
) -> Result<UniverseFrame> {
    check_fraction("threshold_pct", threshold_pct)?;

    let rows = (0..values.shape().0)
        .map(|i| {
            let ranks = competition_rank(&values.row(i));
            let observed = ranks.iter().flatten().count() as f64;
            let cutoff = threshold_pct * observed;
            ranks
                .into_iter()
                .map(|rank| Some(rank.is_some_and(|r| r as f64 <= cutoff)))
                .collect()
        })
        .collect();
    let raw = UniverseFrame::from_rows(values.index().to_vec(), values.columns().to_vec(), rows)?;

    let held = raw
        .reindex(&calendar.timestamps())
        .map_columns(|col| hold_inclusion(col, tolerance_timeframes))
        .fill_unknown(false);
    debug!(
        instruments = held.shape().1,
        included = held.included_count(),
        "ranking computed"
    );
    Ok(held)
}
