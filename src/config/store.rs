use std::collections::{BTreeMap, HashMap};
use std::fs::{read_to_string, rename, write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::{from_str, to_string_pretty};

use super::ConfigResult;

/// Opaque key-value preferences store.
///
/// The query core only ever reads and writes whole string values; it does not know
/// whether they end up in a file, a registry or a browser profile.
pub trait ConfigStore: Send + Sync {
    /// Returns the value stored under `key`, or `fallback` if there is none.
    fn get_string(&self, key: &str, fallback: &str) -> String;

    /// Stores `value` under `key`.
    fn set_string(&self, key: &str, value: &str) -> ConfigResult<()>;
}

/// In-memory store, used by tests and by embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given pairs.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_string(&self, key: &str, fallback: &str) -> String {
        self.values
            .read()
            .get(key)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    fn set_string(&self, key: &str, value: &str) -> ConfigResult<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Preferences persisted as one flat JSON object on disk.
///
/// Every write rewrites the whole file.
#[derive(Debug)]
pub struct JsonFileConfigStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl JsonFileConfigStore {
    /// Opens the preferences file, starting empty if it doesn't exist yet.
    pub fn open(path: &Path) -> ConfigResult<Self> {
        let values = if path.exists() {
            trace!("Loading preferences from {}", path.display());
            from_str(&read_to_string(path)?)?
        } else {
            trace!("{}: does not exist, starting with empty preferences", path.display());
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Side file each write goes through before replacing `path`.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn get_string(&self, key: &str, fallback: &str) -> String {
        self.values
            .read()
            .get(key)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    fn set_string(&self, key: &str, value: &str) -> ConfigResult<()> {
        let mut values = self.values.write();
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Readers only ever see the old or the new file, never a partial one.
        let temp = self.temp_path();
        write(&temp, to_string_pretty(&*values)?)?;
        rename(&temp, &self.path)?;
        Ok(())
    }
}
