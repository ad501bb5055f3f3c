//! Pending task registry with actor pattern
//!
//! Registry owns the in-memory task map and processes messages via channels,
//! so every read-modify-write on a task identity is serialized.

mod manager;
mod messages;

pub use manager::Registry;
pub use messages::{RegistryCommand, RegistryError, RegistryResponse, TaskEntry};
