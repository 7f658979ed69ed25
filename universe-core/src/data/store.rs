//! On-demand, memoized resolution of catalog entries.
//!
//! `get(name)` resolves depth-first:
//! 1. a cached value is returned as is;
//! 2. otherwise the definition is looked up (`MissingDefinition` if absent);
//! 3. its parameter tree is resolved, each reference through `get`;
//! 4. the function is looked up in the registry (`UnknownFunction`);
//! 5. the function runs and its result is cached under `name`.
//!
//! The names currently being resolved are tracked on a stack, so a
//! definition that reaches itself fails with `CyclicDependency` instead of
//! recursing forever.

use std::collections::BTreeMap;

use tracing::debug;

use super::builtins;
use super::cache::DataCache;
use super::definition::DataCatalog;
use super::reference::ParamValue;
use super::registry::{DataFunction, FunctionRegistry, Params};
use crate::error::{Result, UniverseError};
use crate::value::Value;

#[derive(Debug)]
pub struct DataStore {
    catalog: DataCatalog,
    functions: FunctionRegistry<DataFunction>,
    cache: DataCache,
}

impl DataStore {
    /// A store over `catalog` with the builtin data functions registered.
    pub fn new(catalog: DataCatalog) -> Self {
        Self::with_functions(catalog, builtins::data_functions())
    }

    pub fn with_functions(catalog: DataCatalog, functions: FunctionRegistry<DataFunction>) -> Self {
        Self {
            catalog,
            functions,
            cache: DataCache::new(),
        }
    }

    /// Register a custom data function, replacing any function of that name.
    pub fn register<G>(&mut self, name: impl Into<String>, function: G) -> &mut Self
    where
        G: Fn(&Params) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.register(name, function);
        self
    }

    pub fn catalog(&self) -> &DataCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    pub fn functions(&self) -> &FunctionRegistry<DataFunction> {
        &self.functions
    }

    /// Seed or override the value of `name`.
    ///
    /// Later `get` calls, and references from other entries, return `value`
    /// without running the definition's function. The name need not be in
    /// the catalog.
    pub fn update_values(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        let name = name.into();
        if self.cache.replace(name.clone(), value).is_some() {
            debug!(data = %name, "cached value replaced");
        }
        self
    }

    /// Resolve a catalog entry, computing it at most once.
    pub fn get(&mut self, name: &str) -> Result<Value> {
        let mut resolving = Vec::new();
        self.get_tracked(name, &mut resolving)
    }

    /// Resolve a parameter tree so that no reference remains.
    pub fn resolve(&mut self, param: &ParamValue) -> Result<Value> {
        let mut resolving = Vec::new();
        self.resolve_tracked(param, &mut resolving)
    }

    /// Resolve every parameter of a definition or stage.
    pub fn resolve_parameters(
        &mut self,
        parameters: &BTreeMap<String, ParamValue>,
    ) -> Result<BTreeMap<String, Value>> {
        let mut resolving = Vec::new();
        self.resolve_map(parameters, &mut resolving)
    }

    fn get_tracked(&mut self, name: &str, resolving: &mut Vec<String>) -> Result<Value> {
        if let Some(value) = self.cache.get(name) {
            debug!(data = name, "cache hit");
            return Ok(value.clone());
        }
        if resolving.iter().any(|n| n == name) {
            let mut cycle = resolving.clone();
            cycle.push(name.to_string());
            return Err(UniverseError::CyclicDependency { cycle });
        }

        let definition = self
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| UniverseError::MissingDefinition {
                name: name.to_string(),
                available: self.catalog.names(),
            })?;

        resolving.push(name.to_string());
        let resolved = self.resolve_map(definition.parameters(), resolving);
        resolving.pop();
        let resolved = resolved?;

        let function = self
            .functions
            .get(definition.function())
            .cloned()
            .ok_or_else(|| UniverseError::UnknownFunction {
                function: definition.function().to_string(),
                requested_by: name.to_string(),
            })?;

        debug!(data = name, function = definition.function(), "computing");
        let value = function(&Params::new(name, resolved))?;
        Ok(self.cache.insert(name, value).clone())
    }

    fn resolve_map(
        &mut self,
        parameters: &BTreeMap<String, ParamValue>,
        resolving: &mut Vec<String>,
    ) -> Result<BTreeMap<String, Value>> {
        parameters
            .iter()
            .map(|(key, param)| Ok((key.clone(), self.resolve_tracked(param, resolving)?)))
            .collect()
    }

    fn resolve_tracked(&mut self, param: &ParamValue, resolving: &mut Vec<String>) -> Result<Value> {
        match param {
            ParamValue::Literal(value) => Ok(value.clone()),
            ParamValue::Reference(reference) => self.get_tracked(reference.name(), resolving),
            ParamValue::List(items) => items
                .iter()
                .map(|item| self.resolve_tracked(item, resolving))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            ParamValue::Map(map) => self.resolve_map(map, resolving).map(Value::Map),
        }
    }
}
