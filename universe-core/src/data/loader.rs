//! Directory loading for the `load_all_data` builtin.
//!
//! Every `.csv` or `.json` file of a directory becomes one entry keyed by its
//! file stem, either as plain records (`dict`) or as a numeric frame indexed
//! by a datetime column (`dataframe`).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::info;

use crate::calendar::{is_null_marker, parse_datetime};
use crate::error::{Result, UniverseError};
use crate::frame::NumericFrame;
use crate::value::Value;

/// On-disk format of the files to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            other => Err(UniverseError::out_of_range(
                "from_format",
                format!("unknown file format '{other}' (expected csv or json)"),
            )),
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }
}

/// Shape of each loaded entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnFormat {
    Dict,
    DataFrame { index_column: Option<String> },
}

impl ReturnFormat {
    /// Accepts `"dict"`, `"dataframe"` or `{ dataframe = { index_column = ... } }`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let unknown = |found: &str| {
            UniverseError::out_of_range(
                "to_format",
                format!("unknown return format '{found}' (expected dict or dataframe)"),
            )
        };
        match value {
            Value::Str(s) if s == "dict" => Ok(ReturnFormat::Dict),
            Value::Str(s) if s == "dataframe" => Ok(ReturnFormat::DataFrame { index_column: None }),
            Value::Str(s) => Err(unknown(s)),
            Value::Map(map) if map.len() == 1 => {
                let (key, options) = map.iter().next().ok_or_else(|| unknown("{}"))?;
                match key.as_str() {
                    "dict" => Ok(ReturnFormat::Dict),
                    "dataframe" => Ok(ReturnFormat::DataFrame {
                        index_column: options
                            .as_map()
                            .and_then(|o| o.get("index_column"))
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    }),
                    other => Err(unknown(other)),
                }
            }
            other => Err(UniverseError::type_mismatch(
                "to_format",
                "string or single-key map",
                other.type_name(),
            )),
        }
    }
}

/// Load every matching file of `directory`, optionally restricted to the
/// file stems listed in `includes`.
pub fn load_all_data(
    directory: &Path,
    from_format: FileFormat,
    to_format: &ReturnFormat,
    includes: Option<&[String]>,
) -> Result<BTreeMap<String, Value>> {
    let io_err = |source| UniverseError::Io {
        path: directory.display().to_string(),
        source,
    };
    let mut out = BTreeMap::new();
    for entry in fs::read_dir(directory).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(from_format.extension()) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        if let Some(includes) = includes {
            if !includes.iter().any(|name| *name == stem) {
                continue;
            }
        }

        let value = match (from_format, to_format) {
            (FileFormat::Csv, ReturnFormat::Dict) => Value::List(read_csv_records(&path)?),
            (FileFormat::Csv, ReturnFormat::DataFrame { index_column }) => {
                read_csv_frame(&path, index_column.as_deref())?.into()
            }
            (FileFormat::Json, ReturnFormat::Dict) => Value::from_json(read_json(&path)?),
            (FileFormat::Json, ReturnFormat::DataFrame { index_column }) => {
                json_records_to_frame(&path, read_json(&path)?, index_column.as_deref())?.into()
            }
        };
        out.insert(stem, value);
    }
    info!(
        directory = %directory.display(),
        files = out.len(),
        "loaded data files"
    );
    Ok(out)
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = fs::read_to_string(path).map_err(|source| UniverseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| UniverseError::Json {
        path: path.display().to_string(),
        source,
    })
}

fn csv_reader(path: &Path) -> Result<csv::Reader<fs::File>> {
    csv::Reader::from_path(path).map_err(|source| UniverseError::Csv {
        path: path.display().to_string(),
        source,
    })
}

/// Rows as string maps keyed by header.
fn read_csv_records(path: &Path) -> Result<Vec<Value>> {
    let csv_err = |source| UniverseError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut reader = csv_reader(path)?;
    let headers = reader.headers().map_err(csv_err)?.clone();
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let map = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::from(v)))
            .collect();
        records.push(Value::Map(map));
    }
    Ok(records)
}

/// Index timestamps may carry a time or zone suffix; fall back to the date part.
fn parse_index(text: &str) -> Result<NaiveDateTime> {
    parse_datetime(text).or_else(|err| match text.get(..10) {
        Some(date) => parse_datetime(date),
        None => Err(err),
    })
}

fn parse_cell(text: &str, path: &Path, column: &str) -> Result<Option<f64>> {
    let text = text.trim();
    if is_null_marker(text) || text.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    text.parse::<f64>().map(Some).map_err(|_| {
        UniverseError::InvalidFrame(format!(
            "non-numeric value '{text}' in column '{column}' of {}",
            path.display()
        ))
    })
}

fn build_frame(
    path: &Path,
    columns: Vec<String>,
    mut rows: Vec<(NaiveDateTime, Vec<Option<f64>>)>,
) -> Result<NumericFrame> {
    rows.sort_by_key(|(ts, _)| *ts);
    let (index, cells): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
    NumericFrame::from_rows(index, columns, cells).map_err(|err| {
        UniverseError::InvalidFrame(format!("{}: {err}", path.display()))
    })
}

fn read_csv_frame(path: &Path, index_column: Option<&str>) -> Result<NumericFrame> {
    let csv_err = |source| UniverseError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut reader = csv_reader(path)?;
    let headers = reader.headers().map_err(csv_err)?.clone();
    let index_pos = match index_column {
        Some(name) => headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| UniverseError::MissingField {
                field: name.to_string(),
                context: path.display().to_string(),
            })?,
        None => 0,
    };
    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index_pos)
        .map(|(_, h)| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let ts = parse_index(record.get(index_pos).unwrap_or_default())?;
        let mut cells = Vec::with_capacity(columns.len());
        for (i, text) in record.iter().enumerate() {
            if i == index_pos {
                continue;
            }
            let column = headers.get(i).unwrap_or_default();
            cells.push(parse_cell(text, path, column)?);
        }
        rows.push((ts, cells));
    }
    build_frame(path, columns, rows)
}

fn json_records_to_frame(
    path: &Path,
    json: serde_json::Value,
    index_column: Option<&str>,
) -> Result<NumericFrame> {
    let index_key = index_column.unwrap_or("date");
    let records = match json {
        serde_json::Value::Array(records) => records,
        other => {
            return Err(UniverseError::type_mismatch(
                &path.display().to_string(),
                "array of records",
                Value::from_json(other).type_name(),
            ))
        }
    };

    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        if let Some(obj) = record.as_object() {
            for key in obj.keys() {
                if key != index_key && !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        let ts_text = record
            .get(index_key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| UniverseError::MissingField {
                field: index_key.to_string(),
                context: path.display().to_string(),
            })?;
        let ts = parse_index(ts_text)?;
        let cells = columns
            .iter()
            .map(|c| record.get(c).and_then(|v| v.as_f64()))
            .collect();
        rows.push((ts, cells));
    }
    build_frame(path, columns, rows)
}
