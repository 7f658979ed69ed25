//! Lazy placeholders inside parameter trees.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::value::Value;

/// Handle naming one entry of the data catalog. Equality is by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataReference {
    name: String,
}

impl DataReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DataReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{}", self.name)
    }
}

/// A parameter as declared in configuration, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Literal(Value),
    Reference(DataReference),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Shorthand for a reference to the catalog entry `name`.
    pub fn reference(name: impl Into<String>) -> Self {
        ParamValue::Reference(DataReference::new(name))
    }

    /// Names of every catalog entry referenced anywhere in this tree.
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_references(&mut out);
        out
    }

    pub(crate) fn collect_references(&self, out: &mut BTreeSet<String>) {
        match self {
            ParamValue::Literal(_) => {}
            ParamValue::Reference(r) => {
                out.insert(r.name().to_string());
            }
            ParamValue::List(items) => items.iter().for_each(|p| p.collect_references(out)),
            ParamValue::Map(map) => map.values().for_each(|p| p.collect_references(out)),
        }
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        ParamValue::Literal(value)
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for ParamValue {
            fn from(value: $ty) -> Self {
                ParamValue::Literal(Value::from(value))
            }
        })*
    };
}

literal_from!(bool, i64, f64, &str, String);

impl From<DataReference> for ParamValue {
    fn from(reference: DataReference) -> Self {
        ParamValue::Reference(reference)
    }
}
