//! Single-slot persistence for the resolved destination URL.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};
use url::Url;

use crate::core::models::ResolvedDestination;
use crate::errors::LaunchError;

pub trait DestinationStore: Send + Sync {
    fn save(&self, url: &Url) -> Result<(), LaunchError>;
    fn load(&self) -> Result<Option<Url>, LaunchError>;
    fn clear(&self) -> Result<(), LaunchError>;
}

/// JSON file slot, replaced atomically on every save.
pub struct FileDestinationStore {
    path: PathBuf,
}

impl FileDestinationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_record(&self) -> Result<Option<ResolvedDestination>, LaunchError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<ResolvedDestination>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    "Persisted destination is unreadable, ignoring: {}", e
                );
                Ok(None)
            }
        }
    }

    fn write_atomic(&self, content: &[u8]) -> Result<(), LaunchError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let temp_path = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl DestinationStore for FileDestinationStore {
    fn save(&self, url: &Url) -> Result<(), LaunchError> {
        let record = ResolvedDestination::new(url.clone());
        let content = serde_json::to_vec_pretty(&record)
            .map_err(|e| LaunchError::Persistence(format!("serialize destination: {e}")))?;
        self.write_atomic(&content)?;
        debug!(path = %self.path.display(), "Destination persisted");
        Ok(())
    }

    fn load(&self) -> Result<Option<Url>, LaunchError> {
        Ok(self.load_record()?.map(|record| record.url))
    }

    fn clear(&self) -> Result<(), LaunchError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryDestinationStore {
    slot: Mutex<Option<Url>>,
}

impl MemoryDestinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(url: Url) -> Self {
        Self {
            slot: Mutex::new(Some(url)),
        }
    }
}

impl DestinationStore for MemoryDestinationStore {
    fn save(&self, url: &Url) -> Result<(), LaunchError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| LaunchError::Persistence("slot lock poisoned".to_string()))?;
        *slot = Some(url.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<Url>, LaunchError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| LaunchError::Persistence("slot lock poisoned".to_string()))?;
        Ok(slot.clone())
    }

    fn clear(&self) -> Result<(), LaunchError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| LaunchError::Persistence("slot lock poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}
