//! Registry - actor that owns the pending task map
//!
//! The map lives only in memory: it starts empty on every process start and
//! nothing is persisted.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::messages::{RegistryCommand, RegistryError, RegistryResponse, TaskEntry};
use crate::identity::TaskId;

/// Handle to send commands to the Registry actor
#[derive(Debug, Clone)]
pub struct Registry {
    tx: mpsc::Sender<RegistryCommand>,
}

impl Registry {
    /// Spawn a new Registry actor
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(rx));
        info!("Registry spawned");
        Self { tx }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand) -> RegistryResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| RegistryError::ChannelError)?;
        reply_rx.await.map_err(|_| RegistryError::ChannelError)
    }

    /// Track a new task; fails if the identity is already pending
    pub async fn insert(&self, entry: TaskEntry) -> RegistryResponse<()> {
        debug!(id = %entry.id, file_name = %entry.file_name, "insert: called");
        self.request(|reply| RegistryCommand::Insert { entry, reply }).await?
    }

    pub async fn lookup(&self, id: &TaskId) -> RegistryResponse<Option<TaskEntry>> {
        debug!(%id, "lookup: called");
        self.request(|reply| RegistryCommand::Lookup { id: id.clone(), reply })
            .await
    }

    /// Stop tracking a task, returning its entry if it was tracked
    pub async fn remove(&self, id: &TaskId) -> RegistryResponse<Option<TaskEntry>> {
        debug!(%id, "remove: called");
        self.request(|reply| RegistryCommand::Remove { id: id.clone(), reply })
            .await
    }

    /// Stop tracking `entry`, leaving any newer entry for the same identity alone
    pub async fn remove_if(&self, entry: &TaskEntry) -> RegistryResponse<bool> {
        debug!(id = %entry.id, file_name = %entry.file_name, "remove_if: called");
        self.request(|reply| RegistryCommand::RemoveIf {
            entry: entry.clone(),
            reply,
        })
        .await
    }

    /// All tracked tasks, oldest first
    pub async fn list(&self) -> RegistryResponse<Vec<TaskEntry>> {
        debug!("list: called");
        self.request(|reply| RegistryCommand::List { reply }).await
    }

    pub async fn count(&self) -> RegistryResponse<usize> {
        self.request(|reply| RegistryCommand::Count { reply }).await
    }

    /// Shutdown the Registry actor
    pub async fn shutdown(&self) -> RegistryResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(RegistryCommand::Shutdown)
            .await
            .map_err(|_| RegistryError::ChannelError)
    }
}

/// The actor loop that processes commands
async fn actor_loop(mut rx: mpsc::Receiver<RegistryCommand>) {
    debug!("Registry actor started");
    let mut tasks: HashMap<TaskId, TaskEntry> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RegistryCommand::Insert { entry, reply } => {
                debug!(id = %entry.id, "actor_loop: Insert command");
                let result = match tasks.entry(entry.id.clone()) {
                    Entry::Occupied(existing) => Err(RegistryError::DuplicateTask(existing.key().clone())),
                    Entry::Vacant(slot) => {
                        slot.insert(entry);
                        Ok(())
                    }
                };
                let _ = reply.send(result);
            }

            RegistryCommand::Lookup { id, reply } => {
                debug!(%id, "actor_loop: Lookup command");
                let _ = reply.send(tasks.get(&id).cloned());
            }

            RegistryCommand::Remove { id, reply } => {
                debug!(%id, "actor_loop: Remove command");
                let _ = reply.send(tasks.remove(&id));
            }

            RegistryCommand::RemoveIf { entry, reply } => {
                debug!(id = %entry.id, "actor_loop: RemoveIf command");
                let removed = match tasks.entry(entry.id.clone()) {
                    Entry::Occupied(existing) if *existing.get() == entry => {
                        existing.remove();
                        true
                    }
                    _ => false,
                };
                let _ = reply.send(removed);
            }

            RegistryCommand::List { reply } => {
                let mut entries: Vec<TaskEntry> = tasks.values().cloned().collect();
                entries.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)));
                let _ = reply.send(entries);
            }

            RegistryCommand::Count { reply } => {
                let _ = reply.send(tasks.len());
            }

            RegistryCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!(pending = tasks.len(), "Registry shutting down");
                break;
            }
        }
    }

    debug!("Registry actor stopped");
}
