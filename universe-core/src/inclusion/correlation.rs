//! De-duplication of highly correlated instruments.
//!
//! At every calendar timestamp the ranked instruments are walked from best
//! to worst. For each pair whose trailing-window correlation exceeds the
//! threshold in absolute value, the worse-ranked instrument is excluded.
//! Exclusions do not cascade: an excluded instrument still excludes the
//! instruments ranked below it that it is correlated with.

use chrono::NaiveDateTime;

use super::check_fraction;
use crate::calendar::Calendar;
use crate::error::Result;
use crate::frame::{NumericFrame, UniverseFrame};

/// Pearson correlation over the positions where both series have a value.
///
/// `None` with fewer than two such positions or when either side is
/// constant.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}

/// Validity on the calendar, one column per column of `rankings`.
///
/// Rank 1 is best; equal ranks are broken by column order in `rankings`.
/// Instruments without a rank at a timestamp are false there. Timestamps
/// where no instrument is ranked, or that `rankings` does not contain, are
/// left undecided.
///
/// The correlation window at `t` covers the rows of `values` in
/// `[t - rolling_window steps, t]`, or every row up to `t` when that start
/// lies beyond the representable datetime range.
pub fn rolling_correlation_rank_validity(
    values: &NumericFrame,
    rankings: &NumericFrame,
    rolling_window: usize,
    threshold: f64,
    calendar: &Calendar,
) -> Result<UniverseFrame> {
    check_fraction("threshold", threshold)?;

    let index = calendar.timestamps();
    let columns = rankings.columns().to_vec();
    let value_columns: Vec<Option<usize>> =
        columns.iter().map(|c| values.column_position(c)).collect();
    let lookback = i64::try_from(rolling_window).unwrap_or(i64::MAX);

    let rows = index
        .iter()
        .map(|&ts| {
            let Some(row) = rankings.row_position(ts) else {
                return vec![None; columns.len()];
            };
            let mut ranked: Vec<(f64, usize)> = rankings
                .row(row)
                .into_iter()
                .enumerate()
                .filter_map(|(j, rank)| rank.map(|r| (r, j)))
                .collect();
            if ranked.is_empty() {
                return vec![None; columns.len()];
            }
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            let mut validity = vec![Some(false); columns.len()];
            for (_, j) in &ranked {
                validity[*j] = Some(true);
            }

            let from = calendar
                .shift(ts, -lookback)
                .unwrap_or(NaiveDateTime::MIN);
            let window = values.row_range(from, ts);
            let series: Vec<Option<&[Option<f64>]>> = ranked
                .iter()
                .map(|(_, j)| value_columns[*j].map(|v| &values.column_at(v)[window.clone()]))
                .collect();

            for (a, better) in series.iter().enumerate() {
                for (b, worse) in series.iter().enumerate().skip(a + 1) {
                    let (Some(better), Some(worse)) = (better, worse) else {
                        continue;
                    };
                    if pearson(better, worse).is_some_and(|r| r.abs() > threshold) {
                        validity[ranked[b].1] = Some(false);
                    }
                }
            }
            validity
        })
        .collect();

    UniverseFrame::from_rows(index, columns, rows)
}
