//! Error taxonomy for data resolution, inclusion algorithms and pipeline execution.
//!
//! Every variant names the offending entry (data key, function, field, stage
//! or parameter) so an operator can locate the configuration that caused it.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, UniverseError>;

/// Errors raised while resolving data or executing pipeline stages.
#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("data '{name}' is not defined in the catalog (available: {})", available.join(", "))]
    MissingDefinition { name: String, available: Vec<String> },

    #[error("data '{name}' is defined more than once")]
    DuplicateDefinition { name: String },

    #[error("function '{function}' requested by '{requested_by}' is not registered")]
    UnknownFunction {
        function: String,
        requested_by: String,
    },

    #[error("missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    #[error("parameter '{parameter}' is out of range: {reason}")]
    OutOfRange { parameter: String, reason: String },

    #[error("'{name}' has type {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("cyclic data dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("stage '{stage}' declares reserved parameter '{parameter}'")]
    ReservedParameter { stage: String, parameter: String },

    #[error("pipeline stage '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: Box<UniverseError>,
    },

    #[error("invalid datetime '{value}'")]
    InvalidDatetime { value: String },

    #[error("invalid frequency code '{code}'")]
    InvalidFrequency { code: String },

    #[error("malformed frame: {0}")]
    InvalidFrame(String),

    #[error("i/o error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error in '{path}': {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("json error in '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl UniverseError {
    /// Attach a stage name to an error raised while executing that stage.
    pub fn in_stage(stage: &str, source: UniverseError) -> Self {
        UniverseError::StageFailed {
            stage: stage.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn type_mismatch(name: &str, expected: &str, found: &str) -> Self {
        UniverseError::TypeMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn out_of_range(parameter: &str, reason: impl Into<String>) -> Self {
        UniverseError::OutOfRange {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }
}
