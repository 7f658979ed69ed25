//! Scenario tests for the inclusion algorithms on small hand-checked frames.

use chrono::NaiveDateTime;
use universe_core::calendar::{parse_datetime, Calendar};
use universe_core::inclusion::{
    combine_validity, range_validity, ranking, rolling_correlation_rank_validity,
    rolling_validity, ValidityRange,
};
use universe_core::{NumericFrame, UniverseError, UniverseFrame};

// ── Helpers ──────────────────────────────────────────────────────────

fn ts(s: &str) -> NaiveDateTime {
    parse_datetime(s).unwrap()
}

fn names(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

fn rows_of(frame: &UniverseFrame) -> Vec<Vec<Option<bool>>> {
    (0..frame.shape().0).map(|i| frame.row(i)).collect()
}

fn bools(rows: &[&[bool]]) -> Vec<Vec<Option<bool>>> {
    rows.iter()
        .map(|r| r.iter().map(|b| Some(*b)).collect())
        .collect()
}

const T: bool = true;
const F: bool = false;

// ── range_validity ───────────────────────────────────────────────────

fn listings() -> Vec<ValidityRange> {
    vec![
        ValidityRange::new("A", ts("1999-11-18"), None),
        ValidityRange::new("AA", ts("2016-10-18"), None),
        ValidityRange::new("ZX", ts("2011-05-16"), Some(ts("2018-06-14"))),
    ]
}

#[test]
fn range_validity_over_full_history() {
    let calendar = Calendar::parse("2000-01-01", "2022-01-01", "B").unwrap();
    let frame = range_validity(&listings(), &calendar).unwrap();

    assert_eq!(frame.shape(), (5740, 3));
    let count = |c: &str| frame.column(c).unwrap().iter().filter(|v| **v == Some(true)).count();
    // Listed before the calendar starts and never delisted.
    assert_eq!(count("A"), 5740);
    assert_eq!(count("AA"), 1359);
    assert_eq!(count("ZX"), 1849);
    assert_eq!(frame.unknown_count(), 0);
}

#[test]
fn range_validity_after_delisting() {
    let calendar = Calendar::parse("2019-01-01", "2022-01-01", "B").unwrap();
    let frame = range_validity(&listings(), &calendar).unwrap();

    assert_eq!(frame.shape(), (784, 3));
    assert_eq!(frame.included_count(), 784 * 2);
    assert_eq!(frame.column("ZX").unwrap(), vec![Some(false); 784].as_slice());
}

#[test]
fn one_day_range_is_never_valid() {
    let calendar = Calendar::parse("2022-11-01", "2022-11-04", "B").unwrap();
    let entries = [
        ValidityRange::new("ONE", ts("2022-11-02"), Some(ts("2022-11-02"))),
        ValidityRange::new("TWO", ts("2022-11-02"), Some(ts("2022-11-03"))),
    ];
    let frame = range_validity(&entries, &calendar).unwrap();
    assert_eq!(frame.column("ONE").unwrap(), &[Some(false); 4]);
    assert_eq!(
        frame.column("TWO").unwrap(),
        &[Some(false), Some(true), Some(true), Some(false)]
    );
}

#[test]
fn ranges_outside_the_calendar_are_all_false() {
    let calendar = Calendar::parse("2022-11-01", "2022-11-04", "B").unwrap();
    let entries = [
        ValidityRange::new("LATER", ts("2030-01-01"), None),
        ValidityRange::new("EARLIER", ts("2001-01-01"), Some(ts("2005-01-01"))),
        ValidityRange::new("INVERTED", ts("2022-11-03"), Some(ts("2022-11-02"))),
    ];
    let frame = range_validity(&entries, &calendar).unwrap();
    assert_eq!(frame.shape(), (4, 3));
    assert_eq!(frame.included_count(), 0);
    assert_eq!(frame.unknown_count(), 0);
}

// ── ranking ──────────────────────────────────────────────────────────

fn ranking_inputs() -> (NumericFrame, Calendar) {
    let calendar = Calendar::parse("2022-11-01", "2022-11-03", "B").unwrap();
    let values = NumericFrame::from_values(
        calendar.timestamps(),
        names(&["A", "AAL", "AAPL"]),
        vec![
            vec![1.0, 2.0, 3.0],
            vec![6.0, 5.0, 4.0],
            vec![7.0, 9.0, 8.0],
        ],
    )
    .unwrap();
    (values, calendar)
}

#[test]
fn ranking_without_tolerance() {
    let (values, calendar) = ranking_inputs();
    let frame = ranking(&values, 0.5, 0, &calendar).unwrap();
    assert_eq!(
        rows_of(&frame),
        bools(&[&[F, F, T], &[T, F, F], &[F, T, F]])
    );
}

#[test]
fn ranking_with_one_step_tolerance() {
    let (values, calendar) = ranking_inputs();
    let frame = ranking(&values, 0.5, 1, &calendar).unwrap();
    assert_eq!(
        rows_of(&frame),
        bools(&[&[F, F, T], &[T, F, T], &[T, T, F]])
    );
}

#[test]
fn ranking_rejects_threshold_outside_unit_interval() {
    let (values, calendar) = ranking_inputs();
    for bad in [-0.1, 1.01, f64::NAN] {
        assert!(matches!(
            ranking(&values, bad, 0, &calendar).unwrap_err(),
            UniverseError::OutOfRange { .. }
        ));
    }
}

#[test]
fn ranking_fills_timestamps_missing_from_values() {
    let (values, _) = ranking_inputs();
    let wider = Calendar::parse("2022-10-31", "2022-11-04", "B").unwrap();
    let frame = ranking(&values, 1.0, 0, &wider).unwrap();
    assert_eq!(frame.shape(), (5, 3));
    assert_eq!(frame.row(0), vec![Some(false); 3]);
    assert_eq!(frame.row(4), vec![Some(false); 3]);
    assert_eq!(frame.row(1), vec![Some(true); 3]);
}

// ── rolling_validity ─────────────────────────────────────────────────

#[test]
fn rolling_validity_counts_trailing_observations() {
    let calendar = Calendar::parse("2022-11-01", "2022-11-05", "B").unwrap();
    let nan = f64::NAN;
    let values = NumericFrame::from_values(
        calendar.timestamps(),
        names(&["A", "AAL", "AAPL"]),
        vec![
            vec![1.0, 2.0, nan],
            vec![nan, 5.0, 6.0],
            vec![nan, 8.0, 9.0],
            vec![10.0, 11.0, nan],
        ],
    )
    .unwrap();

    let frame = rolling_validity(&values, 0.5, 2, 0, &calendar).unwrap();
    assert_eq!(
        rows_of(&frame),
        bools(&[&[T, T, F], &[T, T, T], &[F, T, T], &[T, T, T]])
    );
}

#[test]
fn rolling_validity_holds_inclusion_for_tolerance() {
    // Tuesday to the following Monday: five sessions.
    let calendar = Calendar::parse("2022-11-01", "2022-11-07", "B").unwrap();
    let nan = f64::NAN;
    let values = NumericFrame::from_values(
        calendar.timestamps(),
        names(&["A"]),
        vec![vec![1.0], vec![nan], vec![nan], vec![nan], vec![nan]],
    )
    .unwrap();

    let held = rolling_validity(&values, 1.0, 1, 2, &calendar).unwrap();
    assert_eq!(rows_of(&held), bools(&[&[T], &[T], &[T], &[F], &[F]]));

    let strict = rolling_validity(&values, 1.0, 1, 0, &calendar).unwrap();
    assert_eq!(rows_of(&strict), bools(&[&[T], &[F], &[F], &[F], &[F]]));
}

// ── rolling_correlation_rank_validity ────────────────────────────────

#[test]
fn correlated_pair_keeps_better_ranked_instrument() {
    let calendar = Calendar::parse("2020-01-01", "2020-01-05", "D").unwrap();
    let index = calendar.timestamps();
    let values = NumericFrame::from_values(
        index.clone(),
        names(&["A", "B"]),
        (1..=5).map(|i| vec![i as f64, 6.0 - i as f64]).collect(),
    )
    .unwrap();
    let rankings = NumericFrame::from_values(
        index,
        names(&["A", "B"]),
        vec![
            vec![1.0, 2.0],
            vec![2.0, 3.0],
            vec![3.0, 4.0],
            vec![4.0, 5.0],
            vec![5.0, 1.0],
        ],
    )
    .unwrap();

    let frame = rolling_correlation_rank_validity(&values, &rankings, 3, 0.5, &calendar).unwrap();
    assert_eq!(
        rows_of(&frame),
        bools(&[&[T, T], &[T, F], &[T, F], &[T, F], &[F, T]])
    );
}

#[test]
fn window_longer_than_representable_history_uses_every_row() {
    let calendar = Calendar::parse("2020-01-01", "2020-01-05", "D").unwrap();
    let index = calendar.timestamps();
    let values = NumericFrame::from_values(
        index.clone(),
        names(&["A", "B"]),
        (1..=5).map(|i| vec![i as f64, 6.0 - i as f64]).collect(),
    )
    .unwrap();
    let rankings = NumericFrame::from_values(
        index,
        names(&["A", "B"]),
        vec![
            vec![1.0, 2.0],
            vec![1.0, 2.0],
            vec![1.0, 2.0],
            vec![1.0, 2.0],
            vec![2.0, 1.0],
        ],
    )
    .unwrap();

    for window in [200_000_000, usize::MAX] {
        let frame =
            rolling_correlation_rank_validity(&values, &rankings, window, 0.5, &calendar).unwrap();
        assert_eq!(
            rows_of(&frame),
            bools(&[&[T, T], &[T, F], &[T, F], &[T, F], &[F, T]])
        );
    }

    let business = Calendar::parse("2020-01-01", "2020-01-07", "B").unwrap();
    let frame =
        rolling_correlation_rank_validity(&values, &rankings, usize::MAX, 0.5, &business).unwrap();
    assert_eq!(frame.shape(), (5, 2));
}

#[test]
fn equal_ranks_prefer_earlier_column() {
    let calendar = Calendar::parse("2020-01-01", "2020-01-03", "D").unwrap();
    let index = calendar.timestamps();
    let values = NumericFrame::from_values(
        index.clone(),
        names(&["A", "B"]),
        vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]],
    )
    .unwrap();
    let rankings = NumericFrame::filled(index, names(&["A", "B"]), Some(1.0));

    let frame = rolling_correlation_rank_validity(&values, &rankings, 2, 0.9, &calendar).unwrap();
    assert_eq!(frame.row(2), vec![Some(true), Some(false)]);
}

#[test]
fn unranked_timestamp_is_undecided() {
    let calendar = Calendar::parse("2020-01-01", "2020-01-03", "D").unwrap();
    let index = calendar.timestamps();
    let values = NumericFrame::filled(index.clone(), names(&["A", "B"]), Some(1.0));
    let rankings = NumericFrame::from_values(
        index[..2].to_vec(),
        names(&["A", "B"]),
        vec![vec![f64::NAN, f64::NAN], vec![1.0, f64::NAN]],
    )
    .unwrap();

    let frame = rolling_correlation_rank_validity(&values, &rankings, 2, 0.5, &calendar).unwrap();
    assert_eq!(frame.row(0), vec![None, None]);
    assert_eq!(frame.row(1), vec![Some(true), Some(false)]);
    // Missing from the rankings frame entirely.
    assert_eq!(frame.row(2), vec![None, None]);
}

// ── combine_validity ─────────────────────────────────────────────────

#[test]
fn combining_stage_outputs() {
    let calendar = Calendar::parse("2022-11-01", "2022-11-03", "B").unwrap();
    let (values, _) = ranking_inputs();
    let ranked = ranking(&values, 0.5, 1, &calendar).unwrap();
    let listed = range_validity(
        &[
            ValidityRange::new("A", ts("2000-01-01"), None),
            ValidityRange::new("AAL", ts("2000-01-01"), Some(ts("2022-11-02"))),
            ValidityRange::new("AAPL", ts("2000-01-01"), None),
        ],
        &calendar,
    )
    .unwrap();

    let universe = combine_validity([&ranked, &listed]).unwrap();
    assert_eq!(
        rows_of(&universe),
        bools(&[&[F, F, T], &[T, F, T], &[T, F, F]])
    );
}

#[test]
fn unknown_survives_only_against_true() {
    let index = vec![ts("2022-11-01"), ts("2022-11-02")];
    let unknown = UniverseFrame::filled(index.clone(), names(&["A"]), None);
    let yes = UniverseFrame::filled(index.clone(), names(&["A"]), Some(true));
    let no = UniverseFrame::filled(index, names(&["A"]), Some(false));

    assert_eq!(combine_validity([&unknown, &yes]).unwrap().unknown_count(), 2);
    assert_eq!(combine_validity([&unknown, &no]).unwrap().unknown_count(), 0);
}
