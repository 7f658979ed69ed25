//! Explicit function registries and the typed view over resolved parameters.
//!
//! A registry maps a function name to a callable. Builtins are inserted at
//! construction; callers may add functions or override builtins by
//! registering under the same name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::calendar::Calendar;
use crate::error::{Result, UniverseError};
use crate::frame::{NumericFrame, UniverseFrame};
use crate::value::Value;

/// A data function: fully resolved parameters in, value out.
pub type DataFunction = Arc<dyn Fn(&Params) -> Result<Value> + Send + Sync>;

/// A pipeline stage function: resolved parameters plus the run calendar.
pub type StageFunction = Arc<dyn Fn(&Params, &Calendar) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
pub struct FunctionRegistry<F> {
    functions: BTreeMap<String, F>,
}

impl<F> fmt::Debug for FunctionRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

impl<F> Default for FunctionRegistry<F> {
    fn default() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }
}

impl<F> FunctionRegistry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a function, returning the one it replaced.
    pub fn insert(&mut self, name: impl Into<String>, function: F) -> Option<F> {
        self.functions.insert(name.into(), function)
    }

    pub fn get(&self, name: &str) -> Option<&F> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FunctionRegistry<DataFunction> {
    pub fn register<G>(&mut self, name: impl Into<String>, function: G) -> &mut Self
    where
        G: Fn(&Params) -> Result<Value> + Send + Sync + 'static,
    {
        self.insert(name, Arc::new(function));
        self
    }
}

impl FunctionRegistry<StageFunction> {
    pub fn register<G>(&mut self, name: impl Into<String>, function: G) -> &mut Self
    where
        G: Fn(&Params, &Calendar) -> Result<Value> + Send + Sync + 'static,
    {
        self.insert(name, Arc::new(function));
        self
    }
}

/// Resolved parameters handed to a function, with typed accessors.
///
/// `owner` is the data entry or stage the parameters belong to; it is used
/// to name the offending entry in errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    owner: String,
    values: BTreeMap<String, Value>,
}

impl Params {
    pub fn new(owner: impl Into<String>, values: BTreeMap<String, Value>) -> Self {
        Self {
            owner: owner.into(),
            values,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// The raw value, `None` when absent or null.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    pub fn require(&self, key: &str) -> Result<&Value> {
        self.get(key).ok_or_else(|| UniverseError::MissingField {
            field: key.to_string(),
            context: format!("parameters of '{}'", self.owner),
        })
    }

    fn mismatch(&self, key: &str, expected: &str, found: &Value) -> UniverseError {
        UniverseError::type_mismatch(
            &format!("{}.{key}", self.owner),
            expected,
            found.type_name(),
        )
    }

    pub fn f64(&self, key: &str) -> Result<f64> {
        let value = self.require(key)?;
        value
            .as_f64()
            .ok_or_else(|| self.mismatch(key, "number", value))
    }

    pub fn usize(&self, key: &str) -> Result<usize> {
        let value = self.require(key)?;
        let int = value
            .as_i64()
            .ok_or_else(|| self.mismatch(key, "integer", value))?;
        usize::try_from(int).map_err(|_| {
            UniverseError::out_of_range(
                &format!("{}.{key}", self.owner),
                format!("{int} must be non-negative"),
            )
        })
    }

    pub fn str(&self, key: &str) -> Result<&str> {
        let value = self.require(key)?;
        value
            .as_str()
            .ok_or_else(|| self.mismatch(key, "string", value))
    }

    pub fn list(&self, key: &str) -> Result<&[Value]> {
        let value = self.require(key)?;
        value
            .as_list()
            .ok_or_else(|| self.mismatch(key, "list", value))
    }

    pub fn map(&self, key: &str) -> Result<&BTreeMap<String, Value>> {
        let value = self.require(key)?;
        value
            .as_map()
            .ok_or_else(|| self.mismatch(key, "map", value))
    }

    pub fn frame(&self, key: &str) -> Result<Arc<NumericFrame>> {
        let value = self.require(key)?;
        value
            .as_frame()
            .cloned()
            .ok_or_else(|| self.mismatch(key, "numeric frame", value))
    }

    pub fn universe(&self, key: &str) -> Result<Arc<UniverseFrame>> {
        let value = self.require(key)?;
        value
            .as_universe()
            .cloned()
            .ok_or_else(|| self.mismatch(key, "universe frame", value))
    }

    pub fn optional_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_bool()
                .map(Some)
                .ok_or_else(|| self.mismatch(key, "bool", value)),
        }
    }

    pub fn optional_usize(&self, key: &str) -> Result<Option<usize>> {
        match self.get(key) {
            None => Ok(None),
            Some(_) => self.usize(key).map(Some),
        }
    }
}
