//! Error types for task lifecycle operations

use thiserror::Error;

use crate::decoder::DecodeError;
use crate::identity::TaskId;
use crate::registry::RegistryError;
use crate::storage::StorageError;

/// Errors from submitting a sample
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Task already pending: {0}")]
    DuplicateTask(TaskId),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Task registry unavailable")]
    RegistryUnavailable,

    #[error("Submission interrupted: {0}")]
    Interrupted(String),
}

impl From<RegistryError> for SubmitError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateTask(id) => Self::DuplicateTask(id),
            RegistryError::ChannelError => Self::RegistryUnavailable,
        }
    }
}

/// Errors from checking a task's status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("Task not pending: {0}")]
    TaskNotFound(TaskId),

    #[error("Task registry unavailable")]
    RegistryUnavailable,
}

/// Errors from retrieving a task's report
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Task not pending: {0}")]
    TaskNotFound(TaskId),

    #[error("Drakvuf result not found: {0}")]
    ResultNotFound(TaskId),

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Task registry unavailable")]
    RegistryUnavailable,
}
