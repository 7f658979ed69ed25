//! Timestamp × instrument tables.
//!
//! A [`Frame`] has a sorted, deduplicated timestamp index (rows), named
//! instrument columns, and column-major cells of `Option<T>`. Two aliases
//! cover everything the pipeline moves around:
//!
//! - [`NumericFrame`]: observations; `None` is a missing value (NaN is
//!   normalised to `None` on construction).
//! - [`UniverseFrame`]: inclusion flags; `None` is an undecided cell.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDateTime;

use crate::error::{Result, UniverseError};

#[derive(Debug, Clone, PartialEq)]
pub struct Frame<T> {
    index: Vec<NaiveDateTime>,
    columns: Vec<String>,
    data: Vec<Vec<Option<T>>>,
}

/// Numeric observations (prices, returns, market caps, ranks).
pub type NumericFrame = Frame<f64>;

/// Three-valued inclusion flags: `Some(true)`, `Some(false)` or unknown.
pub type UniverseFrame = Frame<bool>;

impl<T: Clone> Frame<T> {
    /// Build a frame from column-major data, validating its shape and index.
    pub fn from_columns(
        index: Vec<NaiveDateTime>,
        columns: Vec<String>,
        data: Vec<Vec<Option<T>>>,
    ) -> Result<Self> {
        if columns.len() != data.len() {
            return Err(UniverseError::InvalidFrame(format!(
                "{} column names for {} columns",
                columns.len(),
                data.len()
            )));
        }
        if let Some((name, col)) = columns
            .iter()
            .zip(&data)
            .find(|(_, col)| col.len() != index.len())
        {
            return Err(UniverseError::InvalidFrame(format!(
                "column '{name}' has {} rows, index has {}",
                col.len(),
                index.len()
            )));
        }
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(UniverseError::InvalidFrame(
                "index must be strictly ascending".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(UniverseError::InvalidFrame(format!(
                "duplicate column '{dup}'"
            )));
        }
        Ok(Self {
            index,
            columns,
            data,
        })
    }

    /// Build a frame from row-major data.
    pub fn from_rows(
        index: Vec<NaiveDateTime>,
        columns: Vec<String>,
        rows: Vec<Vec<Option<T>>>,
    ) -> Result<Self> {
        if rows.len() != index.len() {
            return Err(UniverseError::InvalidFrame(format!(
                "{} rows for an index of {}",
                rows.len(),
                index.len()
            )));
        }
        let mut data = vec![Vec::with_capacity(index.len()); columns.len()];
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(UniverseError::InvalidFrame(format!(
                    "row {i} has {} cells, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            for (col, cell) in data.iter_mut().zip(row) {
                col.push(cell);
            }
        }
        Self::from_columns(index, columns, data)
    }

    /// A frame with every cell set to `value`.
    pub fn filled(index: Vec<NaiveDateTime>, columns: Vec<String>, value: Option<T>) -> Self {
        let data = vec![vec![value; index.len()]; columns.len()];
        Self {
            index,
            columns,
            data,
        }
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.columns.len())
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row_position(&self, ts: NaiveDateTime) -> Option<usize> {
        self.index.binary_search(&ts).ok()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<T>]> {
        self.column_position(name).map(|j| self.data[j].as_slice())
    }

    pub fn column_at(&self, j: usize) -> &[Option<T>] {
        &self.data[j]
    }

    /// Iterate `(name, cells)` pairs in column order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[Option<T>])> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.data.iter().map(Vec::as_slice))
    }

    /// Cell at a row/column position.
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        self.data.get(col)?.get(row)?.as_ref()
    }

    /// Cell by timestamp and column name; `None` when absent or null.
    pub fn value_at(&self, ts: NaiveDateTime, column: &str) -> Option<&T> {
        let row = self.row_position(ts)?;
        let col = self.column_position(column)?;
        self.get(row, col)
    }

    /// Row `i` as a vector of cells in column order.
    pub fn row(&self, i: usize) -> Vec<Option<T>> {
        self.data.iter().map(|col| col[i].clone()).collect()
    }

    /// Positions of rows whose timestamp lies in `[from, to]`.
    pub fn row_range(&self, from: NaiveDateTime, to: NaiveDateTime) -> std::ops::Range<usize> {
        let lo = self.index.partition_point(|ts| *ts < from);
        let hi = self.index.partition_point(|ts| *ts <= to);
        lo..hi.max(lo)
    }

    /// Place the frame onto a new index; rows absent from `self` become `None`.
    pub fn reindex(&self, index: &[NaiveDateTime]) -> Self {
        let positions: Vec<Option<usize>> =
            index.iter().map(|ts| self.row_position(*ts)).collect();
        let data = self
            .data
            .iter()
            .map(|col| {
                positions
                    .iter()
                    .map(|pos| pos.and_then(|i| col[i].clone()))
                    .collect()
            })
            .collect();
        Self {
            index: index.to_vec(),
            columns: self.columns.clone(),
            data,
        }
    }

    /// Apply `f` to every cell, keeping the axes.
    pub fn map<U, F>(&self, mut f: F) -> Frame<U>
    where
        F: FnMut(Option<&T>) -> Option<U>,
    {
        Frame {
            index: self.index.clone(),
            columns: self.columns.clone(),
            data: self
                .data
                .iter()
                .map(|col| col.iter().map(|cell| f(cell.as_ref())).collect())
                .collect(),
        }
    }

    /// Transform each column as a whole, keeping the axes.
    pub fn map_columns<U, F>(&self, mut f: F) -> Frame<U>
    where
        F: FnMut(&[Option<T>]) -> Vec<Option<U>>,
    {
        Frame {
            index: self.index.clone(),
            columns: self.columns.clone(),
            data: self.data.iter().map(|col| f(col.as_slice())).collect(),
        }
    }
}

impl NumericFrame {
    /// Build a numeric frame from rows of plain floats, NaN meaning missing.
    pub fn from_values(
        index: Vec<NaiveDateTime>,
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| (!v.is_nan()).then_some(v)).collect())
            .collect();
        Self::from_rows(index, columns, rows)
    }

    /// Align several named series onto the union of their timestamps.
    pub fn from_series(series: Vec<(String, Vec<(NaiveDateTime, Option<f64>)>)>) -> Result<Self> {
        let index: Vec<NaiveDateTime> = series
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(ts, _)| *ts))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut columns = Vec::with_capacity(series.len());
        let mut data = Vec::with_capacity(series.len());
        for (name, points) in series {
            let lookup: HashMap<NaiveDateTime, Option<f64>> = points.into_iter().collect();
            data.push(
                index
                    .iter()
                    .map(|ts| lookup.get(ts).copied().flatten().filter(|v| !v.is_nan()))
                    .collect(),
            );
            columns.push(name);
        }
        Self::from_columns(index, columns, data)
    }
}

impl UniverseFrame {
    /// Number of cells that are definitely included.
    pub fn included_count(&self) -> usize {
        self.data
            .iter()
            .map(|col| col.iter().filter(|c| **c == Some(true)).count())
            .sum()
    }

    /// Number of undecided cells.
    pub fn unknown_count(&self) -> usize {
        self.data
            .iter()
            .map(|col| col.iter().filter(|c| c.is_none()).count())
            .sum()
    }

    /// Collapse unknown cells to `false`.
    pub fn fill_unknown(&self, value: bool) -> Self {
        self.map(|cell| Some(cell.copied().unwrap_or(value)))
    }
}
