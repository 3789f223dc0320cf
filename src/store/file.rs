//! JSON-file backed settings store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{MemoryStore, SettingsStore, StoreValue};
use crate::error::{Result, StoreContext};

#[derive(Debug, Serialize, Deserialize)]
struct SettingsFile {
    /// Absent in hand-written files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    values: BTreeMap<String, StoreValue>,
}

/// Settings persisted as one JSON document.
///
/// Writes are buffered until [`SettingsStore::flush`]; the file is replaced
/// atomically through a sibling temp file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    updated_at: Option<DateTime<Utc>>,
    dirty: bool,
}

impl JsonFileStore {
    /// Open a store, starting empty if the file does not exist yet.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!("Settings file absent, starting empty");
            return Ok(Self {
                path,
                inner: MemoryStore::new(),
                updated_at: None,
                dirty: false,
            });
        }

        let contents = std::fs::read_to_string(&path)
            .store_context(|| format!("Failed to read {}", path.display()))?;
        let file: SettingsFile = serde_json::from_str(&contents)
            .store_context(|| format!("Failed to parse {}", path.display()))?;
        info!(values = file.values.len(), "Loaded settings file");
        Ok(Self {
            path,
            inner: MemoryStore::from_values(file.values),
            updated_at: file.updated_at,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Time of the last successful flush, if any.
    pub const fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn get(&self, key: &str) -> Option<StoreValue> {
        self.inner.get(key)
    }
}

impl SettingsStore for JsonFileStore {
    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.inner.get_bool_or(key, default)
    }

    fn get_number_or(&self, key: &str, default: f64) -> f64 {
        self.inner.get_number_or(key, default)
    }

    fn put_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.dirty = true;
        self.inner.put_bool(key, value)
    }

    fn put_number(&mut self, key: &str, value: f64) -> Result<()> {
        self.dirty = true;
        self.inner.put_number(key, value)
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .store_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let updated_at = Utc::now();
        let file = SettingsFile {
            updated_at: Some(updated_at),
            values: self.inner.values().clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .store_context(|| "Failed to encode settings")?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .store_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .store_context(|| format!("Failed to replace {}", self.path.display()))?;

        self.updated_at = Some(updated_at);
        self.dirty = false;
        debug!(path = %self.path.display(), "Settings file written");
        Ok(())
    }
}
