//! Pass Documents
//!
//! Each pass persists its output as a pretty-printed JSON document in the
//! run workspace. A later run or a single pass can resume from them.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::documents;
use crate::types::{EnrichError, Result};

/// Directory holding the documents of one run
#[derive(Debug, Clone)]
pub struct Workspace {
    id: String,
    dir: PathBuf,
}

impl Workspace {
    /// Fresh workspace `<output_dir>/<uuid>`
    pub fn create(output_dir: &Path) -> Result<Self> {
        let id = uuid::Uuid::new_v4().to_string();
        let dir = output_dir.join(&id);
        fs::create_dir_all(&dir)?;
        info!("Created workspace: {}", dir.display());
        Ok(Self { id, dir })
    }

    /// Existing workspace, for resume
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(EnrichError::Checkpoint {
                document: dir.display().to_string(),
                message: "workspace directory does not exist".to_string(),
            });
        }
        let id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            id,
            dir: dir.to_path_buf(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, document: &str) -> PathBuf {
        self.dir.join(document)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.join(documents::LOG_DIR)
    }

    pub fn has(&self, document: &str) -> bool {
        self.path(document).is_file()
    }

    /// Load a document if present
    pub fn load<T: DeserializeOwned>(&self, document: &str) -> Result<Option<T>> {
        let path = self.path(document);
        if !path.is_file() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        let value = serde_json::from_str(&raw).map_err(|e| EnrichError::Checkpoint {
            document: document.to_string(),
            message: e.to_string(),
        })?;
        debug!(document, "Loaded pass document");
        Ok(Some(value))
    }

    /// Load a document that an earlier pass must have written
    pub fn require<T: DeserializeOwned>(&self, document: &str, producer: &str) -> Result<T> {
        self.load(document)?.ok_or_else(|| EnrichError::Checkpoint {
            document: document.to_string(),
            message: format!("missing, run the {} pass first", producer),
        })
    }

    /// Write a document through a temporary file and rename
    pub fn save<T: Serialize>(&self, document: &str, value: &T) -> Result<()> {
        let path = self.path(document);
        let tmp = self.path(&format!("{}.tmp", document));
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        debug!(document, "Saved pass document");
        Ok(())
    }
}
