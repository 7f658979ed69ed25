//! Sequential pipeline execution.
//!
//! A pipeline is an ordered list of stages. Each stage names a stage
//! function and a parameter tree; the executor resolves the tree through a
//! [`DataStore`], injects the run [`Calendar`] and expects a universe frame
//! back. Stage order is declaration order, nothing is inferred.
//!
//! [`DataStore`]: crate::data::DataStore
//! [`Calendar`]: crate::calendar::Calendar

mod executor;
pub mod stages;

pub use executor::{PipelineExecutor, RESERVED_PARAMETERS};

use std::collections::{BTreeMap, BTreeSet};

use crate::data::ParamValue;

/// One declared stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDefinition {
    name: String,
    function: String,
    parameters: BTreeMap<String, ParamValue>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function: function.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, ParamValue>) -> Self {
        self.parameters.extend(parameters);
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

    /// Catalog entries referenced anywhere in the parameter tree.
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for param in self.parameters.values() {
            param.collect_references(&mut out);
        }
        out
    }
}
