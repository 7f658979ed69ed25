//! Validity from listing date ranges.

use chrono::NaiveDateTime;
use tracing::warn;

use crate::calendar::{is_null_marker, parse_datetime, Calendar};
use crate::error::{Result, UniverseError};
use crate::frame::UniverseFrame;
use crate::value::Value;

/// The period during which an instrument could be traded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityRange {
    pub symbol: String,
    pub valid_start: NaiveDateTime,
    /// `None` while the instrument is still listed.
    pub valid_last: Option<NaiveDateTime>,
}

impl ValidityRange {
    pub fn new(
        symbol: impl Into<String>,
        valid_start: NaiveDateTime,
        valid_last: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            valid_start,
            valid_last,
        }
    }

    /// Read a record with `symbol`, `valid_start_datetime` and an optional
    /// `valid_last_datetime`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let record = value
            .as_map()
            .ok_or_else(|| UniverseError::type_mismatch("validity entry", "map", value.type_name()))?;

        let symbol = record
            .get("symbol")
            .and_then(Value::as_str)
            .ok_or_else(|| UniverseError::MissingField {
                field: "symbol".to_string(),
                context: "validity entry".to_string(),
            })?;
        let context = format!("validity entry '{symbol}'");

        let datetime = |key: &str| -> Result<Option<NaiveDateTime>> {
            match record.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Str(text)) if is_null_marker(text) => Ok(None),
                Some(Value::Str(text)) => parse_datetime(text).map(Some),
                Some(other) => Err(UniverseError::type_mismatch(
                    &format!("{symbol}.{key}"),
                    "datetime string",
                    other.type_name(),
                )),
            }
        };

        let valid_start =
            datetime("valid_start_datetime")?.ok_or_else(|| UniverseError::MissingField {
                field: "valid_start_datetime".to_string(),
                context: context.clone(),
            })?;
        let valid_last = datetime("valid_last_datetime")?;
        Ok(Self::new(symbol, valid_start, valid_last))
    }
}

/// One column per instrument: true on calendar timestamps inside its range
/// clipped to the calendar, false elsewhere.
///
/// A repeated symbol replaces the earlier entry.
pub fn range_validity(entries: &[ValidityRange], calendar: &Calendar) -> Result<UniverseFrame> {
    let index = calendar.timestamps();
    let mut columns: Vec<String> = Vec::with_capacity(entries.len());
    let mut data: Vec<Vec<Option<bool>>> = Vec::with_capacity(entries.len());

    for entry in entries {
        let clipped_start = entry.valid_start.max(calendar.start());
        let clipped_last = entry
            .valid_last
            .map_or(calendar.last(), |last| last.min(calendar.last()));

        let cells = if clipped_start >= clipped_last {
            warn!(
                symbol = %entry.symbol,
                valid_start = %entry.valid_start,
                valid_last = ?entry.valid_last,
                "validity range does not overlap the calendar"
            );
            vec![Some(false); index.len()]
        } else {
            index
                .iter()
                .map(|ts| Some(clipped_start <= *ts && *ts <= clipped_last))
                .collect()
        };

        match columns.iter().position(|c| *c == entry.symbol) {
            Some(j) => data[j] = cells,
            None => {
                columns.push(entry.symbol.clone());
                data.push(cells);
            }
        }
    }

    UniverseFrame::from_columns(index, columns, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ts(s: &str) -> NaiveDateTime {
        parse_datetime(s).unwrap()
    }

    fn record(pairs: &[(&str, &str)]) -> Value {
        let map: BTreeMap<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect();
        Value::Map(map)
    }

    #[test]
    fn reads_records_with_open_end() {
        let entry = ValidityRange::from_value(&record(&[
            ("symbol", "AA"),
            ("valid_start_datetime", "2016-10-18"),
            ("valid_last_datetime", "NaT"),
        ]))
        .unwrap();
        assert_eq!(entry, ValidityRange::new("AA", ts("2016-10-18"), None));
    }

    #[test]
    fn missing_start_is_an_error() {
        let err = ValidityRange::from_value(&record(&[("symbol", "AA")])).unwrap_err();
        match err {
            UniverseError::MissingField { field, context } => {
                assert_eq!(field, "valid_start_datetime");
                assert!(context.contains("AA"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn clips_to_calendar() {
        let calendar = Calendar::parse("2022-11-01", "2022-11-04", "B").unwrap();
        let entries = vec![
            ValidityRange::new("A", ts("2020-01-01"), None),
            ValidityRange::new("B", ts("2022-11-02"), Some(ts("2022-11-03"))),
            ValidityRange::new("C", ts("2021-01-01"), Some(ts("2021-06-01"))),
        ];
        let frame = range_validity(&entries, &calendar).unwrap();
        assert_eq!(frame.column("A").unwrap(), &[Some(true); 4]);
        assert_eq!(
            frame.column("B").unwrap(),
            &[Some(false), Some(true), Some(true), Some(false)]
        );
        assert_eq!(frame.column("C").unwrap(), &[Some(false); 4]);
        assert_eq!(frame.unknown_count(), 0);
    }

    #[test]
    fn repeated_symbol_replaces_earlier_entry() {
        let calendar = Calendar::parse("2022-11-01", "2022-11-04", "B").unwrap();
        let entries = vec![
            ValidityRange::new("A", ts("2020-01-01"), None),
            ValidityRange::new("A", ts("2022-11-03"), None),
        ];
        let frame = range_validity(&entries, &calendar).unwrap();
        assert_eq!(frame.shape(), (4, 1));
        assert_eq!(frame.included_count(), 2);
    }
}
