//! Cross-workspace swarm registry.

use std::path::{Path, PathBuf};
use swarm_core::{
    format_timestamp, now, RegistryEntry, RegistryStatus, RegistryUpdate, ResourceKind,
    SwarmConfig, SwarmError, SwarmResult,
};
use swarm_storage::fs::{read_json, write_json};
use swarm_storage::FileLock;

/// Registry of running swarms, at most one entry per workspace.
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
    lock: FileLock,
}

impl Registry {
    pub fn new(config: &SwarmConfig) -> Self {
        Self::at(&config.registry_path, config)
    }

    /// Registry stored at an explicit path.
    pub fn at(path: &Path, config: &SwarmConfig) -> Self {
        let mut lock_name = path.as_os_str().to_os_string();
        lock_name.push(".lock");
        Self {
            path: path.to_path_buf(),
            lock: FileLock::new(PathBuf::from(lock_name), &config.lock).with_owner("registry"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace the entry for `entry.workspace`.
    pub fn register(&self, entry: RegistryEntry) -> SwarmResult<()> {
        self.lock.with_lock(|| {
            let mut entries = self.read_entries();
            entries.retain(|e| e.workspace != entry.workspace);
            tracing::info!(
                workspace = %entry.workspace,
                session = %entry.session_id,
                "Swarm registered"
            );
            entries.push(entry);
            write_json(&self.path, &entries)
        })
    }

    /// Patch an entry and refresh its `last_updated`.
    pub fn update(&self, workspace: &str, update: &RegistryUpdate) -> SwarmResult<RegistryEntry> {
        self.lock.with_lock(|| {
            let mut entries = self.read_entries();
            let entry = entries
                .iter_mut()
                .find(|e| e.workspace == workspace)
                .ok_or_else(|| SwarmError::not_found(ResourceKind::RegistryEntry, workspace))?;
            entry.apply(update);
            entry.last_updated = format_timestamp(&now());
            let updated = entry.clone();
            write_json(&self.path, &entries)?;
            Ok(updated)
        })
    }

    /// Remove the entry for a workspace. Returns whether one existed.
    pub fn deregister(&self, workspace: &str) -> SwarmResult<bool> {
        self.lock.with_lock(|| {
            let mut entries = self.read_entries();
            let before = entries.len();
            entries.retain(|e| e.workspace != workspace);
            if entries.len() == before {
                return Ok(false);
            }
            write_json(&self.path, &entries)?;
            tracing::info!(workspace, "Swarm deregistered");
            Ok(true)
        })
    }

    pub fn get(&self, workspace: &str) -> Option<RegistryEntry> {
        self.read_entries().into_iter().find(|e| e.workspace == workspace)
    }

    pub fn list_active(&self) -> Vec<RegistryEntry> {
        self.read_entries()
            .into_iter()
            .filter(|e| e.status == RegistryStatus::Active)
            .collect()
    }

    pub fn list_all(&self) -> Vec<RegistryEntry> {
        self.read_entries()
    }

    /// Missing or unreadable registries read as empty.
    fn read_entries(&self) -> Vec<RegistryEntry> {
        match read_json::<Vec<RegistryEntry>>(&self.path) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Registry unreadable, starting empty");
                Vec::new()
            }
        }
    }
}
