//! Memo of resolved data values, owned by a single [`DataStore`].
//!
//! Entries are written the first time a name is resolved. Only an explicit
//! `DataStore::update_values` overwrites one. Two stores never share a cache, so identically named entries
//! in independent catalogs cannot collide.
//!
//! [`DataStore`]: super::store::DataStore

use std::collections::HashMap;

use crate::value::Value;

#[derive(Debug, Default)]
pub struct DataCache {
    entries: HashMap<String, Value>,
}

impl DataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Store a value; an existing entry is kept and returned unchanged.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> &Value {
        self.entries.entry(name.into()).or_insert(value)
    }

    /// Store a value, returning the entry it displaced.
    pub fn replace(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(name.into(), value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names currently memoized, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
