//! Universe run configuration (TOML).
//!
//! ```toml
//! output_filename = "out/universe.parquet"
//! intermediate_directory = "out/stages"
//! start_datetime = "2000-01-01"
//! last_datetime = "2022-01-01"
//! frequency = "B"
//!
//! [data.prices]
//! function = "load_all_data"
//! parameters = { directory = "{data_dir}/prices", from_format = "csv", to_format = "dataframe" }
//!
//! [[pipeline]]
//! name = "liquidity"
//! function = "ranking"
//! parameters = { values = { data = "prices" }, threshold_pct = 0.5 }
//! ```
//!
//! An inline table holding only a `data` key is a reference to a catalog
//! entry. `{key}` placeholders in strings are filled from `-p key=value`
//! parameters; `{{` and `}}` stand for literal braces.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use universe_core::calendar::Calendar;
use universe_core::data::{DataCatalog, DataDefinition, ParamValue};
use universe_core::pipeline::PipelineDefinition;
use universe_core::{UniverseError, Value};

/// Unique identifier for a universe run (content-addressable hash).
pub type RunId = String;

/// Top-level keys every configuration must define.
pub const REQUIRED_KEYS: [&str; 7] = [
    "output_filename",
    "intermediate_directory",
    "start_datetime",
    "last_datetime",
    "frequency",
    "pipeline",
    "data",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("key '{key}' is not found in configuration (available keys: {})", available.join(", "))]
    MissingKey { key: String, available: Vec<String> },
    #[error("invalid value for '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
    #[error("cannot substitute '{{{placeholder}}}' in \"{text}\" (parameters: {})", available.join(", "))]
    Substitution {
        placeholder: String,
        text: String,
        available: Vec<String>,
    },
    #[error("cannot parse parameter '{0}', expected key=value")]
    InvalidParameter(String),
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Universe(#[from] UniverseError),
}

/// One `[[pipeline]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageConfig {
    pub name: String,
    pub function: String,
    #[serde(default)]
    pub parameters: toml::Table,
}

/// One `[data.<name>]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    pub function: String,
    #[serde(default)]
    pub parameters: toml::Table,
}

/// A parsed, substituted universe configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UniverseConfig {
    pub output_filename: PathBuf,
    pub intermediate_directory: PathBuf,
    pub start_datetime: String,
    pub last_datetime: String,
    pub frequency: String,
    pub pipeline: Vec<StageConfig>,
    pub data: BTreeMap<String, DataConfig>,
}

impl UniverseConfig {
    /// Read and parse a configuration file.
    pub fn load(path: &Path, parameters: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, parameters)
    }

    /// Parse configuration text, substituting `parameters` when any are given.
    pub fn parse(text: &str, parameters: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut root: toml::Table = text.parse()?;
        if !parameters.is_empty() {
            root = substitute_table(root, parameters)?;
        }
        let root = stringify_datetimes(toml::Value::Table(root));

        if let toml::Value::Table(table) = &root {
            let available: Vec<String> = table.keys().cloned().collect();
            if let Some(key) = REQUIRED_KEYS.iter().find(|key| !table.contains_key(**key)) {
                return Err(ConfigError::MissingKey {
                    key: key.to_string(),
                    available,
                });
            }
        }

        let config: UniverseConfig = root.try_into()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for stage in &self.pipeline {
            if !seen.insert(stage.name.as_str()) {
                return Err(ConfigError::InvalidKey {
                    key: format!("pipeline.{}", stage.name),
                    reason: "stage name is declared more than once".into(),
                });
            }
        }
        Ok(())
    }

    /// The shared temporal context of the run.
    pub fn calendar(&self) -> Result<Calendar, ConfigError> {
        Ok(Calendar::parse(
            &self.start_datetime,
            &self.last_datetime,
            &self.frequency,
        )?)
    }

    /// Data definitions keyed by name.
    pub fn catalog(&self) -> Result<DataCatalog, ConfigError> {
        let definitions = self
            .data
            .iter()
            .map(|(name, entry)| {
                let parameters = table_to_params(&format!("data.{name}"), &entry.parameters)?;
                Ok(DataDefinition::new(name, &entry.function).with_parameters(parameters))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(DataCatalog::from_definitions(definitions)?)
    }

    /// Pipeline stages in declaration order.
    pub fn pipelines(&self) -> Result<Vec<PipelineDefinition>, ConfigError> {
        self.pipeline
            .iter()
            .map(|stage| {
                let parameters =
                    table_to_params(&format!("pipeline.{}", stage.name), &stage.parameters)?;
                Ok(PipelineDefinition::new(&stage.name, &stage.function).with_parameters(parameters))
            })
            .collect()
    }

    /// Deterministic hash of the configuration.
    ///
    /// Two runs with identical (substituted) configurations share a run id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// Parse `key=value` command-line parameters.
pub fn parse_parameters<S: AsRef<str>>(args: &[S]) -> Result<BTreeMap<String, String>, ConfigError> {
    args.iter()
        .map(|arg| {
            let arg = arg.as_ref();
            match arg.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() && !value.contains('=') => {
                    Ok((key.trim().to_string(), value.to_string()))
                }
                _ => Err(ConfigError::InvalidParameter(arg.to_string())),
            }
        })
        .collect()
}

/// Replace `{key}` placeholders in `text`.
pub fn substitute(text: &str, parameters: &BTreeMap<String, String>) -> Result<String, ConfigError> {
    let failure = |placeholder: &str| ConfigError::Substitution {
        placeholder: placeholder.to_string(),
        text: text.to_string(),
        available: parameters.keys().cloned().collect(),
    };

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(failure(&name));
                }
                out.push_str(parameters.get(&name).ok_or_else(|| failure(&name))?);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn substitute_value(
    value: toml::Value,
    parameters: &BTreeMap<String, String>,
) -> Result<toml::Value, ConfigError> {
    Ok(match value {
        toml::Value::String(s) => toml::Value::String(substitute(&s, parameters)?),
        toml::Value::Array(items) => toml::Value::Array(
            items
                .into_iter()
                .map(|item| substitute_value(item, parameters))
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(table) => toml::Value::Table(substitute_table(table, parameters)?),
        other => other,
    })
}

fn substitute_table(
    table: toml::Table,
    parameters: &BTreeMap<String, String>,
) -> Result<toml::Table, ConfigError> {
    table
        .into_iter()
        .map(|(key, value)| Ok((substitute(&key, parameters)?, substitute_value(value, parameters)?)))
        .collect()
}

/// TOML datetimes become their textual form; the core parses them itself.
fn stringify_datetimes(value: toml::Value) -> toml::Value {
    match value {
        toml::Value::Datetime(dt) => toml::Value::String(dt.to_string()),
        toml::Value::Array(items) => {
            toml::Value::Array(items.into_iter().map(stringify_datetimes).collect())
        }
        toml::Value::Table(table) => toml::Value::Table(
            table
                .into_iter()
                .map(|(k, v)| (k, stringify_datetimes(v)))
                .collect(),
        ),
        other => other,
    }
}

fn table_to_params(
    path: &str,
    table: &toml::Table,
) -> Result<BTreeMap<String, ParamValue>, ConfigError> {
    table
        .iter()
        .map(|(key, value)| Ok((key.clone(), to_param(&format!("{path}.{key}"), value)?)))
        .collect()
}

/// Convert a TOML value into a parameter tree.
pub fn to_param(path: &str, value: &toml::Value) -> Result<ParamValue, ConfigError> {
    Ok(match value {
        toml::Value::String(s) => ParamValue::from(s.as_str()),
        toml::Value::Integer(i) => ParamValue::from(*i),
        toml::Value::Float(f) => ParamValue::from(*f),
        toml::Value::Boolean(b) => ParamValue::from(*b),
        toml::Value::Datetime(dt) => ParamValue::Literal(Value::Str(dt.to_string())),
        toml::Value::Array(items) => ParamValue::List(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| to_param(&format!("{path}[{i}]"), item))
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(table) if table.len() == 1 && table.contains_key("data") => {
            match &table["data"] {
                toml::Value::String(name) => ParamValue::reference(name.as_str()),
                other => {
                    return Err(ConfigError::InvalidKey {
                        key: path.to_string(),
                        reason: format!("data reference must name an entry, found {}", other.type_str()),
                    })
                }
            }
        }
        toml::Value::Table(table) => ParamValue::Map(table_to_params(path, table)?),
    })
}
