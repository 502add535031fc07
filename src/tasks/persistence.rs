use std::{fs, io, path::PathBuf};

use log::{info, warn};

use crate::error::StoreError;

use super::models::Task;

/// Backing storage for one ordered task collection.
pub trait TaskPersistence: Send + Sync {
    /// Missing or unreadable state loads as an empty collection.
    fn load(&self) -> Vec<Task>;
    fn save(&self, tasks: &[Task]) -> Result<(), StoreError>;
}

/// A task collection stored as a JSON array in a single file.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TaskPersistence for JsonFilePersistence {
    fn load(&self) -> Vec<Task> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!("Failed to read {}: {err}; starting empty", self.path.display());
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Task>>(&contents) {
            Ok(tasks) => {
                info!("Loaded {} tasks from {}", tasks.len(), self.path.display());
                tasks
            }
            Err(err) => {
                warn!(
                    "Malformed task file {}: {err}; starting empty",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    fn save(&self, tasks: &[Task]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }
        let serialized = serde_json::to_string_pretty(tasks)?;
        fs::write(&self.path, serialized).map_err(|e| self.io_error(e))
    }
}
