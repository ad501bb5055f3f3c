//! TaskManager - submit, status, report and delete for sandbox tasks
//!
//! Per task identity the lifecycle is `Unknown -> Pending -> done -> Reported`.
//! Completion is never signalled by the worker; it is inferred from the sample
//! having left the incoming and processing areas.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, TaskConfig};
use crate::decoder::{AnalysisResult, decode_result};
use crate::error::{ReportError, StatusError, SubmitError};
use crate::identity::{TaskId, identify};
use crate::registry::{Registry, RegistryError, TaskEntry};
use crate::storage::{StorageError, StorageLayout};

/// What Delete does with files left behind for a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Leave worker artifacts on disk for audit
    #[default]
    Keep,
    /// Remove the task's result directory and any unclaimed incoming sample
    Purge,
}

/// Service capacity snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub pending: usize,
    pub free_slots: usize,
    /// No free slots left
    pub degraded: bool,
}

/// Handle to the task lifecycle; cheap to clone
#[derive(Debug, Clone)]
pub struct TaskManager {
    registry: Registry,
    storage: StorageLayout,
    config: TaskConfig,
}

impl TaskManager {
    /// Create a manager with an empty registry. Must be called inside a tokio runtime.
    pub fn new(storage: StorageLayout, config: TaskConfig) -> Self {
        debug!(?config, "TaskManager::new: called");
        Self {
            registry: Registry::spawn(),
            storage,
            config,
        }
    }

    /// Open the configured storage layout and create a manager on it
    pub fn from_config(config: &Config) -> Result<Self, StorageError> {
        let storage = StorageLayout::open(config.storage.to_storage_dirs())?;
        Ok(Self::new(storage, config.tasks.clone()))
    }

    pub fn storage(&self) -> &StorageLayout {
        &self.storage
    }

    /// Submit a sample for analysis, returning its task handle
    pub async fn submit(&self, bytes: &[u8], file_name: &str) -> Result<TaskId, SubmitError> {
        let id = identify(bytes);
        debug!(%id, %file_name, len = bytes.len(), "submit: called");

        // Reject unusable names before the task becomes visible
        self.storage.incoming_path(file_name)?;

        // Detached so that a caller dropping this future cannot stop between
        // the insert and the write or rollback
        let admission = tokio::spawn(admit(
            self.registry.clone(),
            self.storage.clone(),
            TaskEntry::new(id.clone(), file_name),
            bytes.to_vec(),
        ));
        admission
            .await
            .map_err(|e| SubmitError::Interrupted(e.to_string()))??;

        info!(%id, %file_name, "Task submitted");
        Ok(id)
    }

    /// Whether the worker is done with a task.
    ///
    /// Repeatable and side-effect free. A sample still waiting in the incoming
    /// area counts as not done, as does one in the processing area; only a
    /// sample that has left both is done. `true` is an inference: the result
    /// may still be in flight, in which case `report` returns `ResultNotFound`.
    pub async fn status(&self, id: &TaskId) -> Result<bool, StatusError> {
        debug!(%id, "status: called");
        let entry = self
            .registry
            .lookup(id)
            .await
            .map_err(|_| StatusError::RegistryUnavailable)?
            .ok_or_else(|| StatusError::TaskNotFound(id.clone()))?;

        if self.storage.exists_in_processing(&entry.file_name).await {
            debug!(%id, "status: still processing");
            return Ok(false);
        }
        if self.storage.exists_in_incoming(&entry.file_name).await {
            debug!(%id, "status: not yet picked up");
            return Ok(false);
        }

        debug!(%id, "status: done");
        Ok(true)
    }

    /// Retrieve and decode a task's result.
    ///
    /// The task is retired as soon as the result has been read, so a decode
    /// failure still consumes it. Of concurrent callers only one gets the result.
    pub async fn report(&self, id: &TaskId) -> Result<AnalysisResult, ReportError> {
        debug!(%id, "report: called");
        self.registry
            .lookup(id)
            .await
            .map_err(|_| ReportError::RegistryUnavailable)?
            .ok_or_else(|| ReportError::TaskNotFound(id.clone()))?;

        let bytes = match self.storage.read_finished_result(id).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => return Err(ReportError::ResultNotFound(id.clone())),
            Err(e) => return Err(ReportError::Storage(e)),
        };

        let removed = self
            .registry
            .remove(id)
            .await
            .map_err(|_| ReportError::RegistryUnavailable)?;
        if removed.is_none() {
            debug!(%id, "report: lost race to another caller");
            return Err(ReportError::TaskNotFound(id.clone()));
        }

        let result = decode_result(&bytes, self.config.result_mode).inspect_err(|e| {
            warn!(%id, error = %e, "report: result could not be decoded");
        })?;

        info!(%id, plugin = ?result.plugin(), len = bytes.len(), "Task reported");
        Ok(result)
    }

    /// Stop tracking a task and apply the retention policy. Never fails.
    pub async fn delete(&self, id: &TaskId) {
        debug!(%id, retention = ?self.config.retention, "delete: called");
        let removed = match self.registry.remove(id).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(%id, error = %e, "delete: registry unavailable");
                None
            }
        };

        match self.config.retention {
            RetentionPolicy::Keep => {
                debug!(%id, "delete: keeping artifacts");
            }
            RetentionPolicy::Purge => {
                let incoming = removed.as_ref().map(|entry| entry.file_name.as_str());
                if let Err(e) = self.storage.delete_task_artifacts(id, incoming).await {
                    warn!(%id, error = %e, "Cleaning drakvuf up failed");
                }
            }
        }
    }

    /// Registry entry for a task, if it is pending
    pub async fn lookup(&self, id: &TaskId) -> Result<Option<TaskEntry>, RegistryError> {
        self.registry.lookup(id).await
    }

    /// All pending tasks, oldest first
    pub async fn pending(&self) -> Result<Vec<TaskEntry>, RegistryError> {
        self.registry.list().await
    }

    pub async fn service_status(&self) -> Result<ServiceStatus, RegistryError> {
        let pending = self.registry.count().await?;
        let free_slots = self.config.max_pending.saturating_sub(pending);
        debug!(pending, free_slots, "service_status: called");
        Ok(ServiceStatus {
            pending,
            free_slots,
            degraded: free_slots == 0,
        })
    }

    /// Stop the registry; later calls fail with `RegistryUnavailable`
    pub async fn shutdown(&self) -> Result<(), RegistryError> {
        self.registry.shutdown().await
    }
}

/// Track a task and hand its sample to the worker, or leave no trace of it
async fn admit(registry: Registry, storage: StorageLayout, entry: TaskEntry, bytes: Vec<u8>) -> Result<(), SubmitError> {
    registry.insert(entry.clone()).await?;

    if let Err(e) = storage.write_incoming(&entry.file_name, &bytes).await {
        warn!(id = %entry.id, file_name = %entry.file_name, error = %e, "submit: write failed, rolling back");
        match registry.remove_if(&entry).await {
            Ok(true) => {}
            Ok(false) => debug!(id = %entry.id, "submit: entry already retired"),
            Err(rollback) => warn!(id = %entry.id, error = %rollback, "submit: rollback failed"),
        }
        return Err(e.into());
    }
    Ok(())
}
