//! Registry messages
//!
//! Commands and responses for the actor pattern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::identity::TaskId;

/// Errors from registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Task already pending: {0}")]
    DuplicateTask(TaskId),

    #[error("Channel error")]
    ChannelError,
}

/// Response from registry operations
pub type RegistryResponse<T> = Result<T, RegistryError>;

/// A submitted task awaiting its report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub id: TaskId,
    /// Name the sample was written under in the incoming area
    pub file_name: String,
    pub submitted_at: DateTime<Utc>,
}

impl TaskEntry {
    pub fn new(id: TaskId, file_name: impl Into<String>) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Commands sent to the Registry actor
#[derive(Debug)]
pub enum RegistryCommand {
    Insert {
        entry: TaskEntry,
        reply: oneshot::Sender<RegistryResponse<()>>,
    },
    Lookup {
        id: TaskId,
        reply: oneshot::Sender<Option<TaskEntry>>,
    },
    Remove {
        id: TaskId,
        reply: oneshot::Sender<Option<TaskEntry>>,
    },
    /// Remove only if the stored entry is exactly this one
    RemoveIf {
        entry: TaskEntry,
        reply: oneshot::Sender<bool>,
    },
    List {
        reply: oneshot::Sender<Vec<TaskEntry>>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },

    // Shutdown
    Shutdown,
}
