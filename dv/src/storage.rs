//! Storage layout shared with the sandbox worker
//!
//! The worker contract is three directories:
//!
//! ```text
//! incoming/{file_name}            # written here, picked up by the worker
//! processing/{file_name}          # present while the worker analyzes it
//! finished/{task_id}/drakvuf.log  # result document, one per task
//! ```
//!
//! All path construction for the contract lives in this module.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::identity::TaskId;

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Sample already exists in incoming: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid sample file name: {0:?}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory locations for the worker contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDirs {
    pub incoming: PathBuf,
    pub processing: PathBuf,
    pub finished: PathBuf,
    /// File name of the result document inside `finished/{task_id}/`
    pub result_file: String,
}

/// Filesystem adapter for the incoming/processing/finished areas
#[derive(Debug, Clone)]
pub struct StorageLayout {
    dirs: StorageDirs,
}

impl StorageLayout {
    /// Open the layout, creating any missing directories
    pub fn open(dirs: StorageDirs) -> Result<Self, StorageError> {
        debug!(?dirs, "StorageLayout::open: called");
        for dir in [&dirs.incoming, &dirs.processing, &dirs.finished] {
            std::fs::create_dir_all(dir)?;
        }
        if !is_plain_file_name(&dirs.result_file) {
            return Err(StorageError::InvalidName(dirs.result_file));
        }
        Ok(Self { dirs })
    }

    pub fn dirs(&self) -> &StorageDirs {
        &self.dirs
    }

    /// Path of a sample in the incoming area
    pub fn incoming_path(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.dirs.incoming.join(checked_name(file_name)?))
    }

    /// Path of a sample in the processing area
    pub fn processing_path(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.dirs.processing.join(checked_name(file_name)?))
    }

    /// Per-task directory in the finished area
    pub fn result_dir(&self, id: &TaskId) -> PathBuf {
        self.dirs.finished.join(id.as_str())
    }

    /// Result document for a task
    pub fn result_path(&self, id: &TaskId) -> PathBuf {
        self.result_dir(id).join(&self.dirs.result_file)
    }

    /// Write a sample into the incoming area.
    ///
    /// Never overwrites: an existing file of the same name is reported as
    /// `AlreadyExists`. A partially written file is removed before the error
    /// is returned.
    pub async fn write_incoming(&self, file_name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.incoming_path(file_name)?;
        debug!(path = %path.display(), len = bytes.len(), "write_incoming: called");

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(file_name.to_string()));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let written = match file.write_all(bytes).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            warn!(error = %e, path = %path.display(), "write_incoming: write failed, removing partial file");
            if let Err(cleanup) = fs::remove_file(&path).await {
                warn!(error = %cleanup, path = %path.display(), "write_incoming: could not remove partial file");
            }
            return Err(StorageError::Io(e));
        }

        info!(path = %path.display(), "Sample written to incoming");
        Ok(())
    }

    /// Whether the sample is still waiting for the worker to claim it
    pub async fn exists_in_incoming(&self, file_name: &str) -> bool {
        match self.incoming_path(file_name) {
            Ok(path) => probe(&path).await,
            Err(e) => {
                warn!(error = %e, "exists_in_incoming: unusable name");
                false
            }
        }
    }

    /// Whether the worker is still analyzing the sample
    pub async fn exists_in_processing(&self, file_name: &str) -> bool {
        match self.processing_path(file_name) {
            Ok(path) => probe(&path).await,
            Err(e) => {
                warn!(error = %e, "exists_in_processing: unusable name");
                false
            }
        }
    }

    /// Read the worker's result document for a task
    pub async fn read_finished_result(&self, id: &TaskId) -> Result<Vec<u8>, StorageError> {
        let path = self.result_path(id);
        debug!(path = %path.display(), "read_finished_result: called");
        fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound(path.display().to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }

    /// Remove everything this service left behind for a task.
    ///
    /// Missing artifacts are not an error. `incoming_name` is the sample's
    /// file name when it is still known.
    pub async fn delete_task_artifacts(&self, id: &TaskId, incoming_name: Option<&str>) -> Result<(), StorageError> {
        debug!(%id, ?incoming_name, "delete_task_artifacts: called");

        if let Some(name) = incoming_name {
            let path = self.incoming_path(name)?;
            ignore_missing(fs::remove_file(&path).await)?;
        }

        let dir = self.result_dir(id);
        ignore_missing(fs::remove_dir_all(&dir).await)?;

        info!(%id, "Deleted task artifacts");
        Ok(())
    }
}

/// Existence check that never reports absence on an I/O error
async fn probe(path: &Path) -> bool {
    match fs::try_exists(path).await {
        Ok(exists) => exists,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "probe failed, assuming present");
            true
        }
    }
}

fn ignore_missing(result: std::io::Result<()>) -> Result<(), StorageError> {
    match result {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(StorageError::Io(e)),
        _ => Ok(()),
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == name
    )
}

fn checked_name(name: &str) -> Result<&str, StorageError> {
    if is_plain_file_name(name) {
        Ok(name)
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}
