//! Builtin data functions available to every data store.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use super::loader::{load_all_data, FileFormat, ReturnFormat};
use super::registry::{DataFunction, FunctionRegistry, Params};
use crate::error::{Result, UniverseError};
use crate::frame::NumericFrame;
use crate::value::Value;

/// Registry pre-populated with the builtin data functions.
pub fn data_functions() -> FunctionRegistry<DataFunction> {
    let mut registry: FunctionRegistry<DataFunction> = FunctionRegistry::new();
    registry
        .register("constant", |p| Ok(p.get("value").cloned().unwrap_or(Value::Null)))
        .register("load_all_data", load_all_data_fn)
        .register("concat", concat_fn)
        .register("flatten", flatten_fn)
        .register("filter_records", filter_records_fn)
        .register("dataframe_operator", dataframe_operator_fn);
    registry
}

fn string_list(value: &Value, name: &str) -> Result<Vec<String>> {
    let items = value
        .as_list()
        .ok_or_else(|| UniverseError::type_mismatch(name, "list of strings", value.type_name()))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| UniverseError::type_mismatch(name, "string", item.type_name()))
        })
        .collect()
}

fn load_all_data_fn(p: &Params) -> Result<Value> {
    let directory = p.str("directory")?;
    let from_format = FileFormat::parse(p.str("from_format")?)?;
    let to_format = ReturnFormat::from_value(p.require("to_format")?)?;
    let includes = p
        .get("includes")
        .map(|v| string_list(v, "includes"))
        .transpose()?;
    load_all_data(Path::new(directory), from_format, &to_format, includes.as_deref()).map(Value::Map)
}

/// One column per entry of `data`, taken from `column` of each frame.
pub fn concat(data: &BTreeMap<String, Value>, column: &str) -> Result<NumericFrame> {
    let mut series = Vec::with_capacity(data.len());
    for (key, value) in data {
        let frame = value
            .as_frame()
            .ok_or_else(|| UniverseError::type_mismatch(key, "numeric frame", value.type_name()))?;
        let cells = frame.column(column).ok_or_else(|| UniverseError::MissingField {
            field: column.to_string(),
            context: format!("frame '{key}'"),
        })?;
        let points: Vec<_> = frame.index().iter().copied().zip(cells.iter().copied()).collect();
        series.push((key.clone(), points));
    }
    NumericFrame::from_series(series)
}

fn concat_fn(p: &Params) -> Result<Value> {
    concat(p.map("data")?, p.str("column")?).map(Value::from)
}

/// Flatten a list of lists, optionally de-duplicating and sorting.
///
/// De-duplication keeps the first occurrence. Sorting drops nulls.
pub fn flatten(values: &[Value], ascending: Option<bool>, unique: bool) -> Result<Vec<Value>> {
    let mut out: Vec<Value> = Vec::new();
    for value in values {
        let items = value
            .as_list()
            .ok_or_else(|| UniverseError::type_mismatch("flatten.values", "list of lists", value.type_name()))?;
        for item in items {
            if !unique || !out.contains(item) {
                out.push(item.clone());
            }
        }
    }

    if let Some(ascending) = ascending {
        out.retain(|v| !v.is_null());
        let mut comparable = true;
        out.sort_by(|a, b| {
            a.compare(b).unwrap_or_else(|| {
                comparable = false;
                Ordering::Equal
            })
        });
        if !comparable {
            return Err(UniverseError::type_mismatch(
                "flatten.values",
                "mutually comparable scalars",
                "mixed types",
            ));
        }
        if !ascending {
            out.reverse();
        }
    }
    Ok(out)
}

fn flatten_fn(p: &Params) -> Result<Value> {
    let unique = p.optional_bool("unique")?.unwrap_or(true);
    flatten(p.list("values")?, p.optional_bool("ascending")?, unique).map(Value::List)
}

/// Keep the records whose fields all take one of the allowed values.
pub fn filter_records(records: &[Value], includes: &BTreeMap<String, Value>) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let fields = record
            .as_map()
            .ok_or_else(|| UniverseError::type_mismatch("filter_records.records", "map", record.type_name()))?;
        let mut keep = true;
        for (key, allowed) in includes {
            let field = fields.get(key).ok_or_else(|| UniverseError::MissingField {
                field: key.clone(),
                context: format!("record {i}"),
            })?;
            let allowed = allowed
                .as_list()
                .ok_or_else(|| UniverseError::type_mismatch(key, "list", allowed.type_name()))?;
            keep &= allowed.contains(field);
        }
        if keep {
            out.push(record.clone());
        }
    }
    Ok(out)
}

fn filter_records_fn(p: &Params) -> Result<Value> {
    filter_records(p.list("records")?, p.map("includes")?).map(Value::List)
}

fn lagged<F>(cells: &[Option<f64>], periods: i64, f: F) -> Vec<Option<f64>>
where
    F: Fn(f64, f64) -> Option<f64>,
{
    (0..cells.len())
        .map(|i| {
            let j = i as i64 - periods;
            if j < 0 || j >= cells.len() as i64 {
                return None;
            }
            match (cells[i], cells[j as usize]) {
                (Some(current), Some(previous)) => f(current, previous),
                _ => None,
            }
        })
        .collect()
}

/// Apply a named transform to every column of a frame.
pub fn dataframe_operator(
    frame: &NumericFrame,
    operator: &str,
    parameters: &BTreeMap<String, Value>,
) -> Result<NumericFrame> {
    let periods = match parameters.get("periods") {
        None => 1,
        Some(v) => v
            .as_i64()
            .ok_or_else(|| UniverseError::type_mismatch("periods", "integer", v.type_name()))?,
    };
    let finite = |x: f64| x.is_finite().then_some(x);

    let out = match operator {
        "pct_change" => frame.map_columns(|c| lagged(c, periods, |cur, prev| finite(cur / prev - 1.0))),
        "diff" => frame.map_columns(|c| lagged(c, periods, |cur, prev| Some(cur - prev))),
        "shift" => frame.map_columns(|c| {
            (0..c.len())
                .map(|i| {
                    let j = i as i64 - periods;
                    (0..c.len() as i64).contains(&j).then(|| c[j as usize]).flatten()
                })
                .collect()
        }),
        "abs" => frame.map(|cell| cell.map(|x| x.abs())),
        "mul" => {
            let other = parameters
                .get("other")
                .and_then(Value::as_f64)
                .ok_or_else(|| UniverseError::MissingField {
                    field: "other".to_string(),
                    context: "dataframe_operator 'mul'".to_string(),
                })?;
            frame.map(|cell| cell.map(|x| x * other))
        }
        other => {
            return Err(UniverseError::UnknownFunction {
                function: other.to_string(),
                requested_by: "dataframe_operator".to_string(),
            })
        }
    };
    Ok(out)
}

fn dataframe_operator_fn(p: &Params) -> Result<Value> {
    let empty = BTreeMap::new();
    let parameters = match p.get("parameters") {
        Some(_) => p.map("parameters")?,
        None => &empty,
    };
    dataframe_operator(&*p.frame("df")?, p.str("operator")?, parameters).map(Value::from)
}
