//! Parquet persistence of universe frames.
//!
//! Layout: a `datetime` column (millisecond datetimes, no zone) followed by
//! one nullable boolean column per instrument. Unknown cells are nulls.
//! Writes are atomic: write to `.tmp` then rename into place.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;

use universe_core::UniverseFrame;

pub const DATETIME_COLUMN: &str = "datetime";

/// Convert a universe frame to a Polars DataFrame.
pub fn universe_to_dataframe(frame: &UniverseFrame) -> PolarsResult<DataFrame> {
    let millis: Vec<i64> = frame
        .index()
        .iter()
        .map(|ts| ts.and_utc().timestamp_millis())
        .collect();

    let mut columns = Vec::with_capacity(frame.shape().1 + 1);
    columns.push(
        Column::new(DATETIME_COLUMN.into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
    );
    for (name, cells) in frame.iter_columns() {
        columns.push(Column::new(name.into(), cells.to_vec()));
    }
    DataFrame::new(columns)
}

/// Convert a DataFrame with the layout above back to a universe frame.
pub fn dataframe_to_universe(df: &DataFrame) -> Result<UniverseFrame> {
    let datetimes = df
        .column(DATETIME_COLUMN)
        .context("missing datetime column")?
        .cast(&DataType::Int64)
        .context("datetime column type")?;
    let index = datetimes
        .i64()
        .context("datetime column type")?
        .into_iter()
        .enumerate()
        .map(|(i, ms)| {
            ms.and_then(DateTime::from_timestamp_millis)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| anyhow!("invalid datetime at row {i}"))
        })
        .collect::<Result<Vec<NaiveDateTime>>>()?;

    let mut names = Vec::new();
    let mut data = Vec::new();
    for column in df.get_columns() {
        if column.name().as_str() == DATETIME_COLUMN {
            continue;
        }
        let cells = column
            .bool()
            .with_context(|| format!("column '{}' is not boolean", column.name()))?
            .into_iter()
            .collect();
        names.push(column.name().to_string());
        data.push(cells);
    }
    Ok(UniverseFrame::from_columns(index, names, data)?)
}

/// Write a universe frame to a Parquet file.
pub fn write_universe(frame: &UniverseFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut df = universe_to_dataframe(frame).context("failed to build dataframe")?;

    let tmp_path = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .with_context(|| format!("failed to write parquet to {}", tmp_path.display()))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        anyhow!("failed to move {} into place: {e}", path.display())
    })
}

/// Load a universe frame written by [`write_universe`].
pub fn read_universe(path: &Path) -> Result<UniverseFrame> {
    let file =
        fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let df = ParquetReader::new(file)
        .finish()
        .with_context(|| format!("failed to read parquet from {}", path.display()))?;
    dataframe_to_universe(&df).with_context(|| format!("malformed universe in {}", path.display()))
}
