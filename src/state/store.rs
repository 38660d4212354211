use super::InstanceMap;
use crate::error::{Result, WatchdeckError};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Durable mapping from instance id to instance record
///
/// `load` never fails: a store that cannot be read is reported as empty so
/// the registry stays usable. `save` replaces the whole mapping.
pub trait InstanceStore: Send + Sync {
    fn load(&self) -> InstanceMap;
    fn save(&self, instances: &InstanceMap) -> Result<()>;
}

/// JSON file backed store with atomic replace on save
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a new store with the given file path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read_file(&self) -> std::result::Result<InstanceMap, String> {
        let file = File::open(&self.path).map_err(|e| format!("failed to open: {}", e))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| format!("failed to parse: {}", e))
    }
}

impl InstanceStore for JsonFileStore {
    fn load(&self) -> InstanceMap {
        if !self.path.exists() {
            return InstanceMap::new();
        }

        let mut instances = match self.read_file() {
            Ok(instances) => instances,
            Err(e) => {
                tracing::warn!(
                    "State file {} is unusable ({}), treating it as empty",
                    self.path.display(),
                    e
                );
                return InstanceMap::new();
            }
        };

        let before = instances.len();
        instances.retain(|key, record| key == &record.id);
        if instances.len() != before {
            tracing::warn!(
                "Dropped {} record(s) whose key did not match their id in {}",
                before - instances.len(),
                self.path.display()
            );
        }

        instances
    }

    fn save(&self, instances: &InstanceMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    WatchdeckError::StateSaveError(format!(
                        "Failed to create state directory: {}",
                        e
                    ))
                })?;
            }
        }

        // Readers must never observe a half-written file
        let temp_path = self.path.with_extension("tmp");

        {
            let file = File::create(&temp_path).map_err(|e| {
                WatchdeckError::StateSaveError(format!("Failed to create temp state file: {}", e))
            })?;

            let mut writer = BufWriter::new(file);

            serde_json::to_writer_pretty(&mut writer, instances).map_err(|e| {
                WatchdeckError::StateSaveError(format!("Failed to serialize state: {}", e))
            })?;

            writer.flush().map_err(|e| {
                WatchdeckError::StateSaveError(format!("Failed to flush state file: {}", e))
            })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            WatchdeckError::StateSaveError(format!("Failed to rename temp state file: {}", e))
        })?;

        Ok(())
    }
}

/// In-memory store, used where no file should be touched
#[derive(Default)]
pub struct MemoryStore {
    instances: Mutex<InstanceMap>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instances(instances: InstanceMap) -> Self {
        Self {
            instances: Mutex::new(instances),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of times `save` has been called
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> InstanceMap {
        self.load()
    }
}

impl InstanceStore for MemoryStore {
    fn load(&self) -> InstanceMap {
        self.instances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn save(&self, instances: &InstanceMap) -> Result<()> {
        *self
            .instances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = instances.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
