//! Per-session event log shared by the agents of one workspace.

use std::path::{Path, PathBuf};
use swarm_core::{Event, EventType, LockConfig, SwarmConfig, SwarmResult};
use swarm_storage::fs::{read_json, remove_if_exists, write_json};
use swarm_storage::FileLock;

/// File-name-safe form of a workspace path.
pub fn workspace_slug(workspace: &str) -> String {
    workspace
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct EventBus {
    dir: PathBuf,
    lock_config: LockConfig,
}

impl EventBus {
    pub fn new(config: &SwarmConfig) -> Self {
        Self {
            dir: config.events_dir.clone(),
            lock_config: config.lock.clone(),
        }
    }

    /// `events-<slug>-<session>.json` inside the events directory.
    pub fn path_for(&self, workspace: &str, session_id: &str) -> PathBuf {
        self.dir.join(format!(
            "events-{}-{}.json",
            workspace_slug(workspace),
            session_id
        ))
    }

    fn lock_for(&self, log: &Path) -> FileLock {
        let mut name = log.as_os_str().to_os_string();
        name.push(".lock");
        FileLock::new(PathBuf::from(name), &self.lock_config).with_owner("events")
    }

    /// Append an event to the log of its (workspace, session).
    pub fn broadcast(&self, event: &Event) -> SwarmResult<()> {
        let path = self.path_for(&event.workspace, &event.session_id);
        self.lock_for(&path).with_lock(|| {
            let mut log = read_log(&path);
            log.push(event.clone());
            write_json(&path, &log)
        })?;
        tracing::info!(
            agent = %event.agent_id,
            event_type = %event.event_type,
            session = %event.session_id,
            "Event broadcast"
        );
        Ok(())
    }

    /// Events in append order, optionally restricted to one type.
    pub fn events(
        &self,
        workspace: &str,
        session_id: &str,
        filter: Option<&EventType>,
    ) -> Vec<Event> {
        let mut log = read_log(&self.path_for(workspace, session_id));
        if let Some(kind) = filter {
            log.retain(|e| &e.event_type == kind);
        }
        log
    }

    /// Delete the log of a session. Returns whether it existed.
    pub fn cleanup(&self, workspace: &str, session_id: &str) -> SwarmResult<bool> {
        let path = self.path_for(workspace, session_id);
        self.lock_for(&path).with_lock(|| remove_if_exists(&path))
    }
}

fn read_log(path: &Path) -> Vec<Event> {
    match read_json::<Vec<Event>>(path) {
        Ok(log) => log.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Event log unreadable");
            Vec::new()
        }
    }
}
