//! drakvufd - task lifecycle manager for a Drakvuf analysis sandbox
//!
//! The sandbox worker is a black box driven through three directories: it picks
//! samples up from `incoming/`, keeps them in `processing/` while analyzing,
//! and writes a JSON result to `finished/{task_id}/drakvuf.log`. This crate
//! submits samples into that contract, tracks which tasks are outstanding, and
//! decodes the results once the worker is done.
//!
//! # Architecture
//!
//! ```text
//! submit(bytes) -> identify -> Registry::insert -> StorageLayout::write_incoming
//! status(id)    -> Registry::lookup -> incoming/processing probes
//! report(id)    -> Registry::lookup -> read finished result -> Registry::remove -> decode
//! ```
//!
//! # Example
//!
//! ```ignore
//! use drakvufd::{Config, TaskManager};
//!
//! let manager = TaskManager::from_config(&Config::load(None)?)?;
//! let id = manager.submit(&sample, "sample.exe").await?;
//! if manager.status(&id).await? {
//!     let result = manager.report(&id).await?;
//! }
//! ```

pub mod cli;
pub mod config;
pub mod decoder;
pub mod error;
pub mod identity;
pub mod manager;
pub mod poll;
pub mod registry;
pub mod storage;

pub use config::{Config, LogConfig, StorageConfig, TaskConfig};
pub use decoder::{AnalysisResult, CommonInfo, DecodeError, ResultMode, SyscallArg, SyscallInfo, SyscallReport};
pub use error::{ReportError, StatusError, SubmitError};
pub use identity::{ParseTaskIdError, TaskId, identify};
pub use manager::{RetentionPolicy, ServiceStatus, TaskManager};
pub use poll::{PollError, PollOptions, wait_for_completion};
pub use registry::{Registry, RegistryError, TaskEntry};
pub use storage::{StorageDirs, StorageError, StorageLayout};

/// Result document name inside `finished/{task_id}/`
pub const DEFAULT_RESULT_FILE: &str = "drakvuf.log";

/// Default advertised capacity
pub const DEFAULT_MAX_PENDING: usize = 10;

/// Default seconds between status probes
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default seconds before giving up on a task
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 600;
