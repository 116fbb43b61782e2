//! Global configuration and its persistence.
//!
//! The configuration is stored as three independent sections so a corrupt or
//! outdated section only resets itself to defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::types::Configuration;
use crate::utils::{OptimizerError, OptimizerResult, validate_settings};

const RESIZE_KEY: &str = "resizeConfiguration";
const COMPRESSION_KEY: &str = "compressionConfiguration";
const EXPORT_KEY: &str = "exportConfiguration";

/// Key-value persistence for user settings.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> OptimizerResult<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> OptimizerResult<()>;
}

/// [`KeyValueStore`] backed by a single JSON object on disk.
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> OptimizerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    warn!("Settings file {} is not a JSON object, starting fresh", path.display());
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> OptimizerResult<Option<Value>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> OptimizerResult<()> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value);

        let text = serde_json::to_string_pretty(&*values)
            .map_err(|e| OptimizerError::io(format!("Cannot serialize settings: {e}")))?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Current global configuration.
///
/// Work items receive a clone from [`SettingsHandle::snapshot`]; updates only
/// affect batches prepared afterwards.
pub struct SettingsHandle {
    current: RwLock<Configuration>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl SettingsHandle {
    /// In-memory settings without persistence
    pub fn new(config: Configuration) -> OptimizerResult<Self> {
        validate_settings(&config)?;
        Ok(Self {
            current: RwLock::new(config),
            store: None,
        })
    }

    /// Loads every section from `store`, falling back to defaults per section.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let defaults = Configuration::default();
        let mut config = Configuration {
            resize: read_section(store.as_ref(), RESIZE_KEY).unwrap_or(defaults.resize),
            compression: read_section(store.as_ref(), COMPRESSION_KEY)
                .unwrap_or(defaults.compression),
            export: read_section(store.as_ref(), EXPORT_KEY).unwrap_or(defaults.export),
        };

        if let Err(e) = validate_settings(&config) {
            warn!("Stored settings are invalid ({e}), using defaults");
            config = Configuration::default();
        }

        Self {
            current: RwLock::new(config),
            store: Some(store),
        }
    }

    pub fn snapshot(&self) -> Configuration {
        self.current.read().clone()
    }

    /// Applies `change`, validates the result, persists it and makes it current.
    pub fn update(&self, change: impl FnOnce(&mut Configuration)) -> OptimizerResult<()> {
        let mut candidate = self.snapshot();
        change(&mut candidate);
        self.replace(candidate)
    }

    pub fn replace(&self, config: Configuration) -> OptimizerResult<()> {
        validate_settings(&config)?;

        if let Some(store) = &self.store {
            write_section(store.as_ref(), RESIZE_KEY, &config.resize)?;
            write_section(store.as_ref(), COMPRESSION_KEY, &config.compression)?;
            write_section(store.as_ref(), EXPORT_KEY, &config.export)?;
        }

        *self.current.write() = config;
        debug!("Settings updated");
        Ok(())
    }
}

fn read_section<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let value = match store.get(key) {
        Ok(value) => value?,
        Err(e) => {
            warn!("Cannot read setting {key}: {e}");
            return None;
        }
    };

    serde_json::from_value(value)
        .map_err(|e| warn!("Ignoring invalid setting {key}: {e}"))
        .ok()
}

fn write_section<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> OptimizerResult<()> {
    let value = serde_json::to_value(value)
        .map_err(|e| OptimizerError::io(format!("Cannot serialize {key}: {e}")))?;
    store.set(key, value)
}
