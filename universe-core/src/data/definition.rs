//! Named data definitions and the catalog that owns them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::reference::ParamValue;
use crate::error::{Result, UniverseError};

/// One catalog entry: which function produces it and with what parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDefinition {
    name: String,
    function: String,
    parameters: BTreeMap<String, ParamValue>,
}

impl DataDefinition {
    pub fn new(name: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function: function.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style parameter insertion.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, ParamValue>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParamValue> {
        &self.parameters
    }

    /// Catalog entries this definition depends on directly.
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for param in self.parameters.values() {
            param.collect_references(&mut out);
        }
        out
    }
}

/// The set of data definitions of one run, keyed by unique name.
#[derive(Debug, Clone, Default)]
pub struct DataCatalog {
    definitions: BTreeMap<String, Arc<DataDefinition>>,
}

impl DataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog, rejecting duplicate names.
    pub fn from_definitions(definitions: impl IntoIterator<Item = DataDefinition>) -> Result<Self> {
        let mut catalog = Self::new();
        for definition in definitions {
            catalog.insert(definition)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, definition: DataDefinition) -> Result<()> {
        if self.definitions.contains_key(definition.name()) {
            return Err(UniverseError::DuplicateDefinition {
                name: definition.name().to_string(),
            });
        }
        self.definitions
            .insert(definition.name().to_string(), Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<DataDefinition>> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataDefinition> {
        self.definitions.values().map(|d| d.as_ref())
    }

    /// Direct dependencies of every entry, as an adjacency map.
    pub fn dependency_graph(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.definitions
            .iter()
            .map(|(name, def)| (name.clone(), def.references()))
            .collect()
    }
}
