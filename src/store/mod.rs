//! Operator settings store.
//!
//! The dashboard is reached only through [`SettingsStore`]: typed reads with a
//! caller-supplied default and typed writes. [`MemoryStore`] keeps values in
//! process; [`JsonFileStore`] persists them between runs.

mod file;

pub use file::JsonFileStore;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::Result;

/// A single stored value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreValue {
    Bool(bool),
    Number(f64),
}

/// Key/value port to the operator dashboard.
pub trait SettingsStore: Send {
    /// Boolean under `key`, or `default` if absent or not a boolean.
    fn get_bool_or(&self, key: &str, default: bool) -> bool;

    /// Number under `key`, or `default` if absent or not a number.
    fn get_number_or(&self, key: &str, default: f64) -> f64;

    fn put_bool(&mut self, key: &str, value: bool) -> Result<()>;

    fn put_number(&mut self, key: &str, value: f64) -> Result<()>;

    /// Persist pending writes. In-memory stores have nothing to do.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-process settings store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    values: BTreeMap<String, StoreValue>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_values(values: BTreeMap<String, StoreValue>) -> Self {
        Self { values }
    }

    pub(crate) const fn values(&self) -> &BTreeMap<String, StoreValue> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<StoreValue> {
        self.values.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn put(&mut self, key: &str, value: StoreValue) {
        trace!(key, ?value, "Storing setting");
        self.values.insert(key.to_string(), value);
    }
}

impl SettingsStore for MemoryStore {
    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(StoreValue::Bool(value)) => *value,
            Some(other) => {
                debug!(key, ?other, "Setting is not a boolean, using default");
                default
            }
            None => default,
        }
    }

    fn get_number_or(&self, key: &str, default: f64) -> f64 {
        match self.values.get(key) {
            Some(StoreValue::Number(value)) => *value,
            Some(other) => {
                debug!(key, ?other, "Setting is not a number, using default");
                default
            }
            None => default,
        }
    }

    fn put_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.put(key, StoreValue::Bool(value));
        Ok(())
    }

    fn put_number(&mut self, key: &str, value: f64) -> Result<()> {
        self.put(key, StoreValue::Number(value));
        Ok(())
    }
}
